use anyhow::{Result, bail, ensure};
use ligtask_progress::{
    Difficulty, DisasterProgress, ProgressBackend, ProgressionService, ResultHandoff,
};
use std::collections::HashSet;

type StageKey = (String, Difficulty, i32);

/// Persisted state as seen between two steps.
#[derive(Debug, Clone, Default)]
struct Snapshot {
    disasters: Vec<DisasterProgress>,
    passed: HashSet<StageKey>,
    rows: usize,
}

impl Snapshot {
    fn capture<B: ProgressBackend>(service: &ProgressionService<B>) -> Result<Self> {
        let store = service.store();
        let mini_games = store.list_mini_game_progress();
        let mut seen = HashSet::new();
        for row in &mini_games {
            let key = (row.disaster_name.clone(), row.difficulty, row.mini_game_index);
            if !seen.insert(key) {
                bail!(
                    "duplicate stage row {} {} #{}",
                    row.disaster_name,
                    row.difficulty,
                    row.mini_game_index
                );
            }
        }
        let passed = mini_games
            .iter()
            .filter(|row| row.passed)
            .map(|row| (row.disaster_name.clone(), row.difficulty, row.mini_game_index))
            .collect();
        Ok(Self {
            disasters: store.list_disaster_progress(),
            passed,
            rows: mini_games.len(),
        })
    }
}

/// Drives a service step by step and checks the progression invariants
/// after every completion.
pub struct Playthrough<B: ProgressBackend> {
    service: ProgressionService<B>,
    snapshot: Snapshot,
    steps: usize,
}

impl<B: ProgressBackend> Playthrough<B> {
    pub fn new(service: ProgressionService<B>) -> Result<Self> {
        let snapshot = Snapshot::capture(&service)?;
        let playthrough = Self {
            service,
            snapshot,
            steps: 0,
        };
        playthrough.check_seed()?;
        Ok(playthrough)
    }

    pub const fn service(&self) -> &ProgressionService<B> {
        &self.service
    }

    pub const fn service_mut(&mut self) -> &mut ProgressionService<B> {
        &mut self.service
    }

    pub const fn steps(&self) -> usize {
        self.steps
    }

    /// Report one finished stage and verify the store afterwards.
    pub fn play(
        &mut self,
        disaster: &str,
        difficulty: Difficulty,
        stage_index: i32,
        score: i32,
        max_score: i32,
    ) -> Result<ResultHandoff> {
        let handoff = self
            .service
            .complete_stage(disaster, difficulty, stage_index, score, max_score);
        self.steps += 1;
        let next = Snapshot::capture(&self.service)?;
        check_transition(&self.snapshot, &next).map_err(|err| {
            err.context(format!(
                "step {} ({disaster} {difficulty} #{stage_index} {score}/{max_score})",
                self.steps
            ))
        })?;
        self.snapshot = next;
        Ok(handoff)
    }

    /// Total stages in a track, the quiz included for Easy.
    pub fn stage_count(&self, disaster: &str, difficulty: Difficulty) -> Result<i32> {
        let Some(stages) = self.service.registry().stages(disaster, difficulty) else {
            bail!("no {difficulty} sequence for {disaster}");
        };
        Ok(i32::try_from(stages.len())?)
    }

    pub fn disaster(&self, name: &str) -> Result<DisasterProgress> {
        match self.service.store().get_disaster_progress(name) {
            Some(row) => Ok(row),
            None => bail!("no progress row for {name}"),
        }
    }

    fn check_seed(&self) -> Result<()> {
        let order = self.service.store().disaster_order();
        let names: Vec<&str> = self
            .snapshot
            .disasters
            .iter()
            .map(|row| row.name.as_str())
            .collect();
        ensure!(
            names == order,
            "seeded disasters {names:?} do not follow the configured order {order:?}"
        );
        check_unlock_chain(&self.snapshot.disasters)
    }
}

fn check_transition(before: &Snapshot, after: &Snapshot) -> Result<()> {
    ensure!(
        before.disasters.len() == after.disasters.len(),
        "disaster rows changed from {} to {}",
        before.disasters.len(),
        after.disasters.len()
    );
    ensure!(
        after.rows >= before.rows,
        "stage rows shrank from {} to {}",
        before.rows,
        after.rows
    );
    for (old, new) in before.disasters.iter().zip(&after.disasters) {
        let regressions = [
            ("isUnlocked", old.is_unlocked, new.is_unlocked),
            ("hardUnlocked", old.hard_unlocked, new.hard_unlocked),
            ("easyCompleted", old.easy_completed, new.easy_completed),
            ("hardCompleted", old.hard_completed, new.hard_completed),
            ("quizCompleted", old.quiz_completed, new.quiz_completed),
        ];
        for (flag, was, is) in regressions {
            ensure!(!was || is, "{} lost {flag}", old.name);
        }
    }
    if let Some(lost) = before.passed.difference(&after.passed).next() {
        bail!("{} {} #{} is no longer passed", lost.0, lost.1, lost.2);
    }
    check_unlock_chain(&after.disasters)
}

/// The first disaster is open from the start; every other one opens exactly
/// when its predecessor's quiz is passed.
fn check_unlock_chain(rows: &[DisasterProgress]) -> Result<()> {
    let Some(first) = rows.first() else {
        bail!("no disasters were seeded");
    };
    ensure!(first.is_unlocked, "{} is locked", first.name);
    for pair in rows.windows(2) {
        ensure!(
            pair[1].is_unlocked == pair[0].quiz_completed,
            "{} unlock state disagrees with {} quiz",
            pair[1].name,
            pair[0].name
        );
    }
    for row in rows {
        ensure!(
            row.hard_unlocked == row.quiz_completed,
            "{} hard unlock disagrees with its quiz",
            row.name
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ligtask_progress::ProgressionEngine;

    fn row(name: &str, unlocked: bool, quiz: bool) -> DisasterProgress {
        DisasterProgress {
            id: 0,
            name: name.to_string(),
            easy_completed: false,
            hard_unlocked: quiz,
            hard_completed: false,
            quiz_completed: quiz,
            is_unlocked: unlocked,
        }
    }

    #[test]
    fn fresh_service_passes_seed_checks() {
        let service = ProgressionEngine::default().in_memory().unwrap();
        let mut playthrough = Playthrough::new(service).unwrap();
        playthrough
            .play("Typhoon", Difficulty::Easy, 0, 100, 100)
            .unwrap();
        assert_eq!(playthrough.steps(), 1);
        assert_eq!(playthrough.stage_count("Typhoon", Difficulty::Easy).unwrap(), 5);
    }

    #[test]
    fn chain_rejects_skipped_unlocks() {
        let rows = [row("A", true, false), row("B", false, false), row("C", true, false)];
        assert!(check_unlock_chain(&rows).is_err());
        let rows = [row("A", true, true), row("B", true, false), row("C", false, false)];
        assert!(check_unlock_chain(&rows).is_ok());
    }

    #[test]
    fn transition_rejects_relocking() {
        let before = Snapshot {
            disasters: vec![row("A", true, true), row("B", true, false)],
            ..Snapshot::default()
        };
        let after = Snapshot {
            disasters: vec![row("A", true, true), row("B", false, false)],
            ..Snapshot::default()
        };
        assert!(check_transition(&before, &after).is_err());
        assert!(check_transition(&before, &before).is_ok());
    }
}
