//! The single write path from a finished stage into persisted progress
use crate::config::ProgressionConfig;
use crate::constants::LOG_SERVICE;
use crate::difficulty::Difficulty;
use crate::handoff::{ResultHandoff, ResultSlot};
use crate::registry::{NextStage, StageRegistry};
use crate::scoring::clamp_score;
use crate::store::{ProgressBackend, ProgressStore, StoreError};

/// Orchestrates scoring, persistence and navigation.
///
/// Stage controllers report through [`Self::complete_stage`] only; menus read
/// through [`Self::store`] and [`Self::registry`].
#[derive(Debug)]
pub struct ProgressionService<B: ProgressBackend> {
    config: ProgressionConfig,
    store: ProgressStore<B>,
    registry: StageRegistry,
    results: ResultSlot,
}

impl<B: ProgressBackend> ProgressionService<B> {
    /// Build the service and initialize the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unavailable or corrupt.
    pub fn new(config: ProgressionConfig, backend: B) -> Result<Self, StoreError> {
        let store = ProgressStore::open(backend, config.disaster_names())?;
        let registry = StageRegistry::from_config(&config);
        Ok(Self {
            config,
            store,
            registry,
            results: ResultSlot::default(),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &ProgressionConfig {
        &self.config
    }

    #[must_use]
    pub const fn store(&self) -> &ProgressStore<B> {
        &self.store
    }

    #[must_use]
    pub const fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Score, persist and navigate for a finished stage.
    pub fn complete_stage(
        &mut self,
        disaster: &str,
        difficulty: Difficulty,
        stage_index: i32,
        raw_score: i32,
        max_score: i32,
    ) -> ResultHandoff {
        let (difficulty, stage_index) = self.classify(disaster, difficulty, stage_index);
        let score = clamp_score(raw_score, max_score);
        if score != raw_score {
            log::debug!(target: LOG_SERVICE, "Clamped {disaster} {difficulty} score {raw_score} to {score}");
        }

        let slot = usize::try_from(stage_index).ok();
        let rule = slot
            .and_then(|index| self.config.rule_for(disaster, difficulty, index))
            .unwrap_or_else(|| {
                log::warn!(
                    target: LOG_SERVICE,
                    "No stage {stage_index} in {disaster} {difficulty}, using the tier default"
                );
                self.config.defaults.rule_for(difficulty)
            });
        let passed = rule.passes(score, max_score);

        self.store
            .upsert_mini_game_result(disaster, difficulty, stage_index, passed);
        self.store
            .apply_disaster_level_effects(disaster, difficulty, passed);

        let stage_id = slot
            .and_then(|index| self.registry.stage_at(disaster, difficulty, index))
            .map(str::to_string);
        if let Some(id) = &stage_id {
            self.registry.set_cursor_by_stage_id(disaster, difficulty, id);
        }

        log::info!(
            target: LOG_SERVICE,
            "{disaster} {difficulty} #{stage_index}: {score}/{max_score} ({})",
            if passed { "passed" } else { "failed" }
        );

        let handoff = ResultHandoff {
            score,
            max_score,
            passed,
            disaster_name: disaster.to_string(),
            difficulty,
            stage_index,
            stage_id,
        };
        self.results.store(handoff.clone());
        handoff
    }

    /// Gate for stage selection: the first Easy stage is always open, the
    /// first Hard stage needs Hard unlocked, every later stage (the quiz
    /// included) needs the stage before it passed.
    #[must_use]
    pub fn can_enter_stage(&self, disaster: &str, difficulty: Difficulty, stage_index: i32) -> bool {
        let Some(progress) = self.store.get_disaster_progress(disaster) else {
            log::warn!(target: LOG_SERVICE, "Cannot gate unknown disaster '{disaster}'");
            return false;
        };
        let Some(len) = self.registry.stages(disaster, difficulty).map(<[String]>::len) else {
            return false;
        };
        let Some(index) = usize::try_from(stage_index).ok().filter(|index| *index < len) else {
            log::warn!(target: LOG_SERVICE, "{disaster} {difficulty} has no stage {stage_index}");
            return false;
        };

        let quiz_index = len - 1;
        if difficulty.is_quiz() && index != quiz_index {
            log::warn!(target: LOG_SERVICE, "{disaster} quiz is stage {quiz_index}, not {stage_index}");
            return false;
        }

        match (difficulty.track(), index) {
            (Difficulty::Hard, 0) => progress.hard_unlocked,
            (_, 0) => true,
            (track, _) => self
                .store
                .is_stage_passed(disaster, track, stage_index - 1),
        }
    }

    /// Whether a disaster's track can be picked from the top-level menu.
    #[must_use]
    pub fn can_select_track(&self, disaster: &str, difficulty: Difficulty) -> bool {
        self.store
            .get_disaster_progress(disaster)
            .is_some_and(|progress| match difficulty.track() {
                Difficulty::Hard => progress.is_unlocked && progress.hard_unlocked,
                _ => progress.is_unlocked,
            })
    }

    /// Pick a disaster track from the top-level menu. Rewinds its cursor and
    /// returns the first stage to load, or `None` while the track is locked.
    pub fn select_track(&mut self, disaster: &str, difficulty: Difficulty) -> Option<String> {
        if !self.can_select_track(disaster, difficulty) {
            log::info!(target: LOG_SERVICE, "{disaster} {difficulty} is still locked");
            return None;
        }
        let track = difficulty.track();
        self.registry.set_key_default(disaster, track);
        self.registry.last_stage().map(str::to_string)
    }

    /// Jump straight to a stage from the stage-select menu.
    pub fn enter_stage(
        &mut self,
        disaster: &str,
        difficulty: Difficulty,
        stage_index: i32,
    ) -> Option<String> {
        if !self.can_enter_stage(disaster, difficulty, stage_index) {
            return None;
        }
        let index = usize::try_from(stage_index).ok()?;
        let stage = self.registry.stage_at(disaster, difficulty, index)?.to_string();
        self.registry
            .set_cursor_by_stage_id(disaster, difficulty, &stage);
        Some(stage)
    }

    pub fn current_stage(&mut self, disaster: &str, difficulty: Difficulty) -> Option<&str> {
        self.registry.get_current_stage(disaster, difficulty)
    }

    pub fn next_stage(&mut self, disaster: &str, difficulty: Difficulty) -> Option<NextStage> {
        self.registry.get_next_stage(disaster, difficulty)
    }

    #[must_use]
    pub fn peek_next_stage(&self, disaster: &str, difficulty: Difficulty) -> Option<&str> {
        self.registry.peek_next_stage(disaster, difficulty)
    }

    /// Scene to load for a navigation step, honoring the table's terminal scene.
    #[must_use]
    pub fn scene_for<'a>(&'a self, step: &'a NextStage) -> &'a str {
        match step {
            NextStage::Stage(id) => id,
            NextStage::Complete => &self.config.terminal_scene,
        }
    }

    /// Stage to reload for a retry.
    #[must_use]
    pub fn retry_stage(&self) -> Option<&str> {
        self.registry.last_stage()
    }

    /// Forget all navigation state, as on an app-level restart.
    pub fn restart(&mut self) {
        self.registry.reset();
        self.results = ResultSlot::default();
    }

    #[must_use]
    pub const fn latest_result(&self) -> Option<&ResultHandoff> {
        self.results.peek()
    }

    /// Read the pending result once.
    pub fn take_result(&mut self) -> Option<ResultHandoff> {
        self.results.take()
    }

    /// An Easy result reported at the quiz position is the quiz, and a quiz
    /// result always lands on the quiz position.
    fn classify(&self, disaster: &str, difficulty: Difficulty, stage_index: i32) -> (Difficulty, i32) {
        let quiz_index = self
            .config
            .disaster(disaster)
            .and_then(|cfg| cfg.quiz_index())
            .and_then(|index| i32::try_from(index).ok());
        match (difficulty, quiz_index) {
            (Difficulty::Easy, Some(quiz)) if quiz == stage_index => {
                log::debug!(target: LOG_SERVICE, "{disaster} Easy #{stage_index} is the quiz");
                (Difficulty::Quiz, stage_index)
            }
            (Difficulty::Quiz, Some(quiz)) if quiz != stage_index => {
                log::debug!(
                    target: LOG_SERVICE,
                    "{disaster} quiz reported as #{stage_index}, recording it as #{quiz}"
                );
                (Difficulty::Quiz, quiz)
            }
            _ => (difficulty, stage_index),
        }
    }
}
