//! Stage topology and per-sequence navigation cursors
//!
//! A sequence is keyed by `"{disaster}_{difficulty}"`. The quiz is the last
//! stage of the Easy sequence, so `Quiz` lookups resolve to the Easy key.
use std::collections::{BTreeMap, HashMap};

use crate::config::ProgressionConfig;
use crate::constants::{LOG_REGISTRY, TERMINAL_SCENE};
use crate::difficulty::Difficulty;

/// Result of advancing a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStage {
    Stage(String),
    /// The sequence has been played through.
    Complete,
}

impl NextStage {
    /// Scene to load for this step.
    #[must_use]
    pub fn scene(&self) -> &str {
        match self {
            Self::Stage(id) => id,
            Self::Complete => TERMINAL_SCENE,
        }
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Disaster and difficulty the player is currently in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub disaster: String,
    pub difficulty: Difficulty,
}

/// Builds the sequence key for a disaster and difficulty.
#[must_use]
pub fn sequence_key(disaster: &str, difficulty: Difficulty) -> String {
    format!("{disaster}_{}", difficulty.track())
}

/// Static stage sequences plus one cursor per sequence.
#[derive(Debug, Clone, Default)]
pub struct StageRegistry {
    sequences: BTreeMap<String, Vec<String>>,
    cursors: HashMap<String, usize>,
    selection: Option<Selection>,
    last_stage: Option<String>,
}

impl StageRegistry {
    /// Build the registry from the progression table.
    #[must_use]
    pub fn from_config(config: &ProgressionConfig) -> Self {
        let mut sequences = BTreeMap::new();
        for disaster in &config.disasters {
            for difficulty in [Difficulty::Easy, Difficulty::Hard] {
                let stages = disaster.track(difficulty);
                if stages.is_empty() {
                    continue;
                }
                sequences.insert(
                    sequence_key(&disaster.name, difficulty),
                    stages.iter().map(|stage| stage.id.clone()).collect(),
                );
            }
        }
        Self {
            sequences,
            ..Self::default()
        }
    }

    /// Build a registry from explicit `(key, stages)` pairs.
    pub fn from_sequences<K, I, S>(sequences: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Vec<S>)>,
        S: Into<String>,
    {
        Self {
            sequences: sequences
                .into_iter()
                .map(|(key, stages)| (key.into(), stages.into_iter().map(Into::into).collect()))
                .collect(),
            ..Self::default()
        }
    }

    /// Every sequence key, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sequences.keys().map(String::as_str)
    }

    /// Ordered stage ids of a sequence.
    #[must_use]
    pub fn stages(&self, disaster: &str, difficulty: Difficulty) -> Option<&[String]> {
        self.sequences
            .get(&sequence_key(disaster, difficulty))
            .map(Vec::as_slice)
    }

    #[must_use]
    pub fn stage_at(&self, disaster: &str, difficulty: Difficulty, index: usize) -> Option<&str> {
        self.stages(disaster, difficulty)?
            .get(index)
            .map(String::as_str)
    }

    #[must_use]
    pub fn index_of(&self, disaster: &str, difficulty: Difficulty, stage_id: &str) -> Option<usize> {
        self.stages(disaster, difficulty)?
            .iter()
            .position(|stage| stage == stage_id)
    }

    /// Cursor of a sequence, `0` when it has never been touched.
    #[must_use]
    pub fn cursor(&self, disaster: &str, difficulty: Difficulty) -> Option<usize> {
        let key = sequence_key(disaster, difficulty);
        self.sequences.contains_key(&key).then(|| self.cursor_for(&key))
    }

    #[must_use]
    pub const fn current_selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Last stage entered, the target of a retry.
    #[must_use]
    pub fn last_stage(&self) -> Option<&str> {
        self.last_stage.as_deref()
    }

    /// Stage under the cursor.
    pub fn get_current_stage(&mut self, disaster: &str, difficulty: Difficulty) -> Option<&str> {
        let key = self.known_key(disaster, difficulty)?;
        let index = *self.cursors.entry(key.clone()).or_insert(0);
        let stage = self.sequences.get(&key)?.get(index)?.clone();
        self.track_entry(disaster, difficulty, stage);
        self.last_stage.as_deref()
    }

    /// Advance the cursor and return the new stage, or [`NextStage::Complete`]
    /// once the last stage has been reached. Repeated calls at the end keep
    /// returning `Complete` without moving.
    pub fn get_next_stage(&mut self, disaster: &str, difficulty: Difficulty) -> Option<NextStage> {
        let key = self.known_key(disaster, difficulty)?;
        let len = self.sequences.get(&key).map_or(0, Vec::len);
        let cursor = self.cursors.entry(key.clone()).or_insert(0);
        if *cursor + 1 >= len {
            return Some(NextStage::Complete);
        }
        *cursor += 1;
        let index = *cursor;
        let stage = self.sequences.get(&key)?.get(index)?.clone();
        self.track_entry(disaster, difficulty, stage.clone());
        Some(NextStage::Stage(stage))
    }

    /// The stage [`Self::get_next_stage`] would return, without moving the cursor.
    /// `None` at the end of the sequence or for an unknown key.
    #[must_use]
    pub fn peek_next_stage(&self, disaster: &str, difficulty: Difficulty) -> Option<&str> {
        let key = self.known_key(disaster, difficulty)?;
        let next = self.cursor_for(&key) + 1;
        self.sequences.get(&key)?.get(next).map(String::as_str)
    }

    /// Point the cursor at `stage_id`, for stages entered directly from a menu
    /// or a retry. Unknown ids leave the cursor untouched.
    pub fn set_cursor_by_stage_id(&mut self, disaster: &str, difficulty: Difficulty, stage_id: &str) {
        let Some(key) = self.known_key(disaster, difficulty) else {
            return;
        };
        let Some(index) = self.index_of(disaster, difficulty, stage_id) else {
            log::warn!(target: LOG_REGISTRY, "Stage '{stage_id}' is not part of {key}");
            return;
        };
        self.cursors.insert(key, index);
        self.track_entry(disaster, difficulty, stage_id.to_string());
    }

    /// Rewind a sequence to its first stage, as when a disaster is picked
    /// from the top-level menu.
    pub fn set_key_default(&mut self, disaster: &str, difficulty: Difficulty) {
        let Some(key) = self.known_key(disaster, difficulty) else {
            self.selection = Some(Selection {
                disaster: disaster.to_string(),
                difficulty,
            });
            self.last_stage = None;
            return;
        };
        self.cursors.insert(key.clone(), 0);
        let first = self.sequences.get(&key).and_then(|stages| stages.first()).cloned();
        self.selection = Some(Selection {
            disaster: disaster.to_string(),
            difficulty,
        });
        self.last_stage = first;
    }

    /// Forget every cursor and the current selection.
    pub fn reset(&mut self) {
        self.cursors.clear();
        self.selection = None;
        self.last_stage = None;
    }

    /// Every stage of a sequence except the one under the cursor, with its
    /// one-based game number, for the stage-select menu.
    #[must_use]
    pub fn sibling_stages(&self, disaster: &str, difficulty: Difficulty) -> Vec<(usize, &str)> {
        let Some(key) = self.known_key(disaster, difficulty) else {
            return Vec::new();
        };
        let current = self.cursor_for(&key);
        self.sequences
            .get(&key)
            .map(|stages| {
                stages
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| *index != current)
                    .map(|(index, stage)| (index + 1, stage.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn cursor_for(&self, key: &str) -> usize {
        self.cursors.get(key).copied().unwrap_or(0)
    }

    fn known_key(&self, disaster: &str, difficulty: Difficulty) -> Option<String> {
        if disaster.is_empty() {
            log::error!(target: LOG_REGISTRY, "Disaster name is empty");
            return None;
        }
        let key = sequence_key(disaster, difficulty);
        if self.sequences.contains_key(&key) {
            Some(key)
        } else {
            log::warn!(target: LOG_REGISTRY, "No stage sequence for {key}");
            None
        }
    }

    fn track_entry(&mut self, disaster: &str, difficulty: Difficulty, stage: String) {
        self.selection = Some(Selection {
            disaster: disaster.to_string(),
            difficulty,
        });
        self.last_stage = Some(stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> StageRegistry {
        StageRegistry::from_sequences([
            (
                "Typhoon_Easy",
                vec!["TyphoonEasy", "Evacuate", "Windows", "AvoidDebris", "TyphoonQuiz"],
            ),
            ("Typhoon_Hard", vec!["TyphoonHard", "EvacuateHard"]),
        ])
    }

    #[test]
    fn current_stage_defaults_to_first() {
        let mut registry = registry();
        assert_eq!(
            registry.get_current_stage("Typhoon", Difficulty::Easy),
            Some("TyphoonEasy")
        );
        assert_eq!(registry.cursor("Typhoon", Difficulty::Easy), Some(0));
    }

    #[test]
    fn next_stage_walks_to_the_end_and_stays_complete() {
        let mut registry = registry();
        let mut visited = Vec::new();
        for _ in 0..4 {
            match registry.get_next_stage("Typhoon", Difficulty::Easy) {
                Some(NextStage::Stage(id)) => visited.push(id),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(visited, ["Evacuate", "Windows", "AvoidDebris", "TyphoonQuiz"]);
        for _ in 0..3 {
            assert_eq!(
                registry.get_next_stage("Typhoon", Difficulty::Easy),
                Some(NextStage::Complete)
            );
        }
        assert_eq!(registry.cursor("Typhoon", Difficulty::Easy), Some(4));
        assert_eq!(NextStage::Complete.scene(), TERMINAL_SCENE);
    }

    #[test]
    fn peek_does_not_move_the_cursor() {
        let mut registry = registry();
        assert_eq!(registry.peek_next_stage("Typhoon", Difficulty::Hard), Some("EvacuateHard"));
        assert_eq!(registry.peek_next_stage("Typhoon", Difficulty::Hard), Some("EvacuateHard"));
        assert_eq!(registry.cursor("Typhoon", Difficulty::Hard), Some(0));
        registry.get_next_stage("Typhoon", Difficulty::Hard);
        assert_eq!(registry.peek_next_stage("Typhoon", Difficulty::Hard), None);
    }

    #[test]
    fn cursor_resyncs_to_known_stage_ids_only() {
        let mut registry = registry();
        registry.set_cursor_by_stage_id("Typhoon", Difficulty::Easy, "Windows");
        assert_eq!(registry.cursor("Typhoon", Difficulty::Easy), Some(2));
        assert_eq!(registry.last_stage(), Some("Windows"));

        registry.set_cursor_by_stage_id("Typhoon", Difficulty::Easy, "Nowhere");
        assert_eq!(registry.cursor("Typhoon", Difficulty::Easy), Some(2));
        assert_eq!(registry.last_stage(), Some("Windows"));
    }

    #[test]
    fn quiz_resolves_to_the_easy_sequence() {
        let mut registry = registry();
        registry.set_cursor_by_stage_id("Typhoon", Difficulty::Quiz, "TyphoonQuiz");
        assert_eq!(registry.cursor("Typhoon", Difficulty::Easy), Some(4));
        assert_eq!(
            registry.get_next_stage("Typhoon", Difficulty::Easy),
            Some(NextStage::Complete)
        );
    }

    #[test]
    fn key_default_and_reset_rewind_cursors() {
        let mut registry = registry();
        registry.get_next_stage("Typhoon", Difficulty::Easy);
        registry.get_next_stage("Typhoon", Difficulty::Hard);
        registry.set_key_default("Typhoon", Difficulty::Easy);
        assert_eq!(registry.cursor("Typhoon", Difficulty::Easy), Some(0));
        assert_eq!(registry.cursor("Typhoon", Difficulty::Hard), Some(1));
        assert_eq!(registry.last_stage(), Some("TyphoonEasy"));
        assert_eq!(
            registry.current_selection(),
            Some(&Selection {
                disaster: "Typhoon".to_string(),
                difficulty: Difficulty::Easy
            })
        );

        registry.reset();
        assert_eq!(registry.cursor("Typhoon", Difficulty::Hard), Some(0));
        assert!(registry.current_selection().is_none());
        assert!(registry.last_stage().is_none());
    }

    #[test]
    fn unknown_keys_degrade_quietly() {
        let mut registry = registry();
        assert_eq!(registry.get_current_stage("Flood", Difficulty::Easy), None);
        assert_eq!(registry.get_next_stage("Flood", Difficulty::Easy), None);
        assert_eq!(registry.peek_next_stage("", Difficulty::Easy), None);
        registry.set_cursor_by_stage_id("Flood", Difficulty::Easy, "FloodEasy");
        assert_eq!(registry.cursor("Flood", Difficulty::Easy), None);
        assert!(registry.sibling_stages("Flood", Difficulty::Hard).is_empty());
    }

    #[test]
    fn siblings_skip_the_current_stage() {
        let mut registry = registry();
        registry.set_cursor_by_stage_id("Typhoon", Difficulty::Easy, "Evacuate");
        let siblings = registry.sibling_stages("Typhoon", Difficulty::Easy);
        assert_eq!(
            siblings,
            [(1, "TyphoonEasy"), (3, "Windows"), (4, "AvoidDebris"), (5, "TyphoonQuiz")]
        );
    }

    #[test]
    fn config_builds_easy_and_hard_keys() {
        let config = ProgressionConfig::load_from_static().unwrap();
        let registry = StageRegistry::from_config(&config);
        assert_eq!(registry.keys().count(), config.disasters.len() * 2);
        assert_eq!(registry.stage_at("Flood", Difficulty::Hard, 0), Some("FloodHard"));
        assert_eq!(registry.index_of("Flood", Difficulty::Quiz, "FloodQuiz"), Some(4));
    }
}
