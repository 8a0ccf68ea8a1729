//! Scripted and seeded playthroughs of the progression engine
use anyhow::{Result, bail, ensure};
use ligtask_progress::{Difficulty, NextStage, ProgressBackend, TERMINAL_SCENE};
use rand::Rng;
use rand_chacha::ChaCha20Rng;

use super::playthrough::Playthrough;

const RANDOM_WALK_STEPS: usize = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Smoke,
    FullCampaign,
    RetryRegression,
    Gating,
    ThresholdBoundaries,
    RandomWalk,
}

impl Scenario {
    pub const ALL: [Self; 6] = [
        Self::Smoke,
        Self::FullCampaign,
        Self::RetryRegression,
        Self::Gating,
        Self::ThresholdBoundaries,
        Self::RandomWalk,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::Smoke => "smoke",
            Self::FullCampaign => "full-campaign",
            Self::RetryRegression => "retry-regression",
            Self::Gating => "gating",
            Self::ThresholdBoundaries => "threshold-boundaries",
            Self::RandomWalk => "random-walk",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Smoke => "First session: seed, pass an Easy stage, pass the quiz",
            Self::FullCampaign => "Clear every Easy and Hard track in unlock order",
            Self::RetryRegression => "Failing retries never clear an earlier pass",
            Self::Gating => "Locked tracks and stages refuse entry until earned",
            Self::ThresholdBoundaries => "Every stage passes at its threshold and fails one below",
            Self::RandomWalk => "Random results across all tracks keep progress monotonic",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|scenario| scenario.key() == key)
    }

    pub fn run<B: ProgressBackend>(
        self,
        playthrough: &mut Playthrough<B>,
        rng: &mut ChaCha20Rng,
    ) -> Result<()> {
        match self {
            Self::Smoke => smoke(playthrough),
            Self::FullCampaign => full_campaign(playthrough, rng),
            Self::RetryRegression => retry_regression(playthrough, rng),
            Self::Gating => gating(playthrough),
            Self::ThresholdBoundaries => threshold_boundaries(playthrough, rng),
            Self::RandomWalk => random_walk(playthrough, rng),
        }
    }
}

pub fn list_scenarios() -> impl Iterator<Item = (&'static str, &'static str)> {
    Scenario::ALL
        .into_iter()
        .map(|scenario| (scenario.key(), scenario.description()))
}

fn smoke<B: ProgressBackend>(run: &mut Playthrough<B>) -> Result<()> {
    let order = run.service().store().disaster_order().to_vec();
    let Some(first) = order.first() else {
        bail!("no disasters configured");
    };

    let entry = run.service_mut().select_track(first, Difficulty::Easy);
    ensure!(entry.is_some(), "{first} Easy is not selectable on a fresh store");

    let handoff = run.play(first, Difficulty::Easy, 0, 65, 100)?;
    ensure!(handoff.passed, "65/100 on the first Easy stage should pass");
    ensure!(run.disaster(first)?.easy_completed, "{first} easyCompleted not set");
    let next = run.service().peek_next_stage(first, Difficulty::Easy);
    ensure!(
        next.is_some() && next == run.service().registry().stage_at(first, Difficulty::Easy, 1),
        "navigation did not advance past stage 0"
    );

    let quiz = run.stage_count(first, Difficulty::Easy)? - 1;
    let handoff = run.play(first, Difficulty::Quiz, quiz, 75, 100)?;
    ensure!(handoff.passed, "75/100 on the quiz should pass");
    ensure!(run.disaster(first)?.hard_unlocked, "{first} Hard still locked after the quiz");
    if let Some(second) = order.get(1) {
        ensure!(run.disaster(second)?.is_unlocked, "{second} still locked after the {first} quiz");
    }
    Ok(())
}

/// Score in `[threshold, max]` for the stage, so it always passes.
fn passing_score<B: ProgressBackend>(
    run: &Playthrough<B>,
    rng: &mut ChaCha20Rng,
    disaster: &str,
    difficulty: Difficulty,
    index: i32,
    max: i32,
) -> Result<i32> {
    let Some(rule) = usize::try_from(index)
        .ok()
        .and_then(|index| run.service().config().rule_for(disaster, difficulty, index))
    else {
        bail!("no rule for {disaster} {difficulty} #{index}");
    };
    let threshold = i32::try_from(rule.threshold(max))?;
    Ok(rng.gen_range(threshold..=max))
}

fn clear_track<B: ProgressBackend>(
    run: &mut Playthrough<B>,
    rng: &mut ChaCha20Rng,
    disaster: &str,
    track: Difficulty,
) -> Result<()> {
    let Some(first) = run.service_mut().select_track(disaster, track) else {
        bail!("{disaster} {track} is locked");
    };
    let count = run.stage_count(disaster, track)?;
    let mut stage = first;
    for index in 0..count {
        let difficulty = if track == Difficulty::Easy && index == count - 1 {
            Difficulty::Quiz
        } else {
            track
        };
        ensure!(
            run.service().can_enter_stage(disaster, difficulty, index),
            "{disaster} {difficulty} #{index} ({stage}) refused entry"
        );
        let max = rng.gen_range(5..=150);
        let score = passing_score(run, rng, disaster, difficulty, index, max)?;
        let handoff = run.play(disaster, difficulty, index, score, max)?;
        ensure!(handoff.passed, "{stage} failed with {score}/{max}");
        ensure!(handoff.stage_id.as_deref() == Some(stage.as_str()), "handoff names the wrong stage");

        match run.service_mut().next_stage(disaster, track) {
            Some(NextStage::Stage(next)) => stage = next,
            Some(step @ NextStage::Complete) => {
                ensure!(index == count - 1, "{disaster} {track} ended early at #{index}");
                let scene = run.service().scene_for(&step);
                ensure!(scene == TERMINAL_SCENE, "unexpected terminal scene {scene}");
            }
            None => bail!("{disaster} {track} has no navigation"),
        }
    }
    Ok(())
}

fn full_campaign<B: ProgressBackend>(run: &mut Playthrough<B>, rng: &mut ChaCha20Rng) -> Result<()> {
    let order = run.service().store().disaster_order().to_vec();
    for disaster in &order {
        clear_track(run, rng, disaster, Difficulty::Easy)?;
        clear_track(run, rng, disaster, Difficulty::Hard)?;
    }
    for row in run.service().store().list_disaster_progress() {
        ensure!(
            row.is_unlocked && row.easy_completed && row.quiz_completed && row.hard_completed,
            "{} not fully completed: {row:?}",
            row.name
        );
    }
    Ok(())
}

fn retry_regression<B: ProgressBackend>(
    run: &mut Playthrough<B>,
    rng: &mut ChaCha20Rng,
) -> Result<()> {
    let order = run.service().store().disaster_order().to_vec();
    let disaster = &order[rng.gen_range(0..order.len())];
    let count = run.stage_count(disaster, Difficulty::Hard)?;
    let index = rng.gen_range(0..count);

    let failed = run.play(disaster, Difficulty::Hard, index, 0, 100)?;
    ensure!(!failed.passed && failed.retry_label() == "Retry", "0/100 should fail");
    ensure!(run.service().retry_stage() == failed.stage_id.as_deref(), "retry target lost");

    let passed = run.play(disaster, Difficulty::Hard, index, 100, 100)?;
    ensure!(passed.passed && passed.retry_label() == "Play Again", "100/100 should pass");

    for _ in 0..rng.gen_range(1..5) {
        let score = rng.gen_range(-50..30);
        run.play(disaster, Difficulty::Hard, index, score, 100)?;
    }
    let store = run.service().store();
    ensure!(
        store.is_stage_passed(disaster, Difficulty::Hard, index),
        "{disaster} Hard #{index} regressed"
    );
    ensure!(
        store.get_mini_game_progress(disaster, Difficulty::Hard).len() == 1,
        "retries created extra rows"
    );
    Ok(())
}

fn gating<B: ProgressBackend>(run: &mut Playthrough<B>) -> Result<()> {
    let order = run.service().store().disaster_order().to_vec();
    let (Some(first), Some(second)) = (order.first(), order.get(1)) else {
        bail!("gating needs at least two disasters");
    };
    let quiz = run.stage_count(first, Difficulty::Easy)? - 1;

    let service = run.service_mut();
    ensure!(service.select_track(second, Difficulty::Easy).is_none(), "{second} open too early");
    ensure!(service.select_track(first, Difficulty::Hard).is_none(), "{first} Hard open too early");
    ensure!(service.enter_stage(first, Difficulty::Easy, 1).is_none(), "stage 1 open too early");
    ensure!(service.enter_stage(first, Difficulty::Quiz, quiz).is_none(), "quiz open too early");
    ensure!(service.enter_stage(first, Difficulty::Easy, 0).is_some(), "stage 0 must be open");

    for index in 0..quiz {
        run.play(first, Difficulty::Easy, index, 100, 100)?;
        let next = index + 1;
        let kind = if next == quiz { Difficulty::Quiz } else { Difficulty::Easy };
        ensure!(
            run.service_mut().enter_stage(first, kind, next).is_some(),
            "{first} #{next} still closed after passing #{index}"
        );
    }
    run.play(first, Difficulty::Quiz, quiz, 100, 100)?;

    let service = run.service_mut();
    ensure!(service.select_track(second, Difficulty::Easy).is_some(), "{second} still locked");
    ensure!(service.enter_stage(first, Difficulty::Hard, 0).is_some(), "{first} Hard #0 closed");
    ensure!(service.enter_stage(first, Difficulty::Hard, 1).is_none(), "{first} Hard #1 open early");
    Ok(())
}

fn threshold_boundaries<B: ProgressBackend>(
    run: &mut Playthrough<B>,
    rng: &mut ChaCha20Rng,
) -> Result<()> {
    let config = run.service().config().clone();
    for disaster in &config.disasters {
        for track in [Difficulty::Easy, Difficulty::Hard] {
            let quiz = disaster.quiz_index();
            for index in 0..disaster.track(track).len() {
                let difficulty = if track == Difficulty::Easy && Some(index) == quiz {
                    Difficulty::Quiz
                } else {
                    track
                };
                let Some(rule) = config.rule_for(&disaster.name, difficulty, index) else {
                    bail!("{} {difficulty} #{index} has no rule", disaster.name);
                };
                let max = rng.gen_range(1..=200);
                let threshold = i32::try_from(rule.threshold(max))?;
                let stage_index = i32::try_from(index)?;
                if threshold > 0 {
                    let below = run.play(&disaster.name, difficulty, stage_index, threshold - 1, max)?;
                    ensure!(
                        !below.passed,
                        "{} {difficulty} #{index} passed at {}/{max} ({rule:?})",
                        disaster.name,
                        threshold - 1
                    );
                }
                let at = run.play(&disaster.name, difficulty, stage_index, threshold, max)?;
                ensure!(
                    at.passed,
                    "{} {difficulty} #{index} failed at {threshold}/{max} ({rule:?})",
                    disaster.name
                );
            }
        }
    }
    Ok(())
}

fn random_walk<B: ProgressBackend>(run: &mut Playthrough<B>, rng: &mut ChaCha20Rng) -> Result<()> {
    let order = run.service().store().disaster_order().to_vec();
    for _ in 0..RANDOM_WALK_STEPS {
        let disaster = &order[rng.gen_range(0..order.len())];
        let difficulty = Difficulty::ALL[rng.gen_range(0..Difficulty::ALL.len())];
        let count = run.stage_count(disaster, difficulty)?;
        let index = if difficulty.is_quiz() {
            count - 1
        } else {
            rng.gen_range(0..count)
        };
        let max = rng.gen_range(1..=120);
        let score = rng.gen_range(-10..=max + 10);
        if !run.service().can_enter_stage(disaster, difficulty, index) {
            log::debug!("{disaster} {difficulty} #{index} reported while still gated");
        }
        run.play(disaster, difficulty, index, score, max)?;
    }
    Ok(())
}
