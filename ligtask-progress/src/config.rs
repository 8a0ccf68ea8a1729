//! Build-time progression table: disaster order, stage sequences and thresholds
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::constants::{MAX_PASS_PCT, TERMINAL_SCENE};
use crate::difficulty::Difficulty;
use crate::scoring::{Rounding, ScoringPolicy, ThresholdRule};

const DEFAULT_PROGRESSION_DATA: &str = include_str!("../assets/data/progression.json");

/// Errors raised when the progression table violates its invariants.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("progression data is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("progression table lists no disasters")]
    NoDisasters,
    #[error("disaster name must not be empty")]
    EmptyDisasterName,
    #[error("disaster '{0}' is listed more than once")]
    DuplicateDisaster(String),
    #[error("{disaster} {difficulty} sequence has no stages")]
    EmptySequence {
        disaster: String,
        difficulty: Difficulty,
    },
    #[error("{disaster} Easy sequence needs at least one stage before the quiz")]
    EasyWithoutQuiz { disaster: String },
    #[error("stage '{stage}' appears twice in the {disaster} {difficulty} sequence")]
    DuplicateStage {
        disaster: String,
        difficulty: Difficulty,
        stage: String,
    },
    #[error("stage '{stage}' pass percentage {pct} exceeds 100")]
    PassPctOutOfRange { stage: String, pct: u8 },
}

/// One playable stage of a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCfg {
    pub id: String,
    /// Overrides the tier default when present.
    #[serde(default)]
    pub pass_pct: Option<u8>,
    #[serde(default)]
    pub rounding: Option<Rounding>,
}

impl StageCfg {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pass_pct: None,
            rounding: None,
        }
    }

    fn resolve(&self, fallback: ThresholdRule) -> ThresholdRule {
        ThresholdRule {
            pass_pct: self.pass_pct.unwrap_or(fallback.pass_pct),
            rounding: self.rounding.unwrap_or(fallback.rounding),
        }
    }
}

/// Stage sequences for one disaster. The last Easy stage is the quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisasterCfg {
    pub name: String,
    pub easy: Vec<StageCfg>,
    #[serde(default)]
    pub hard: Vec<StageCfg>,
}

impl DisasterCfg {
    #[must_use]
    pub fn track(&self, difficulty: Difficulty) -> &[StageCfg] {
        match difficulty.track() {
            Difficulty::Hard => &self.hard,
            _ => &self.easy,
        }
    }

    /// Index of the quiz stage, which closes the Easy sequence.
    #[must_use]
    pub fn quiz_index(&self) -> Option<usize> {
        self.easy.len().checked_sub(1)
    }
}

/// The complete progression table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionConfig {
    #[serde(default = "default_terminal_scene")]
    pub terminal_scene: String,
    #[serde(default)]
    pub defaults: ScoringPolicy,
    pub disasters: Vec<DisasterCfg>,
}

impl ProgressionConfig {
    /// Parse and validate a progression table from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the table is inconsistent.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the table bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled asset fails validation.
    pub fn load_from_static() -> Result<Self, ConfigError> {
        Self::from_json(DEFAULT_PROGRESSION_DATA)
    }

    /// Check the table invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.disasters.is_empty() {
            return Err(ConfigError::NoDisasters);
        }

        let mut names = HashSet::new();
        for disaster in &self.disasters {
            if disaster.name.is_empty() {
                return Err(ConfigError::EmptyDisasterName);
            }
            if !names.insert(disaster.name.as_str()) {
                return Err(ConfigError::DuplicateDisaster(disaster.name.clone()));
            }
            if disaster.easy.len() == 1 {
                return Err(ConfigError::EasyWithoutQuiz {
                    disaster: disaster.name.clone(),
                });
            }
            for difficulty in [Difficulty::Easy, Difficulty::Hard] {
                validate_sequence(&disaster.name, difficulty, disaster.track(difficulty))?;
            }
        }
        Ok(())
    }

    /// Disaster names in unlock order.
    pub fn disaster_names(&self) -> impl Iterator<Item = &str> {
        self.disasters.iter().map(|d| d.name.as_str())
    }

    #[must_use]
    pub fn disaster(&self, name: &str) -> Option<&DisasterCfg> {
        self.disasters.iter().find(|d| d.name == name)
    }

    /// Threshold for a stage: the stage override if any, else the tier default.
    /// The quiz stage falls back to the quiz default even when addressed via Easy.
    #[must_use]
    pub fn rule_for(
        &self,
        disaster: &str,
        difficulty: Difficulty,
        stage_index: usize,
    ) -> Option<ThresholdRule> {
        let cfg = self.disaster(disaster)?;
        let stage = cfg.track(difficulty).get(stage_index)?;
        let kind = if difficulty.track() == Difficulty::Easy && Some(stage_index) == cfg.quiz_index()
        {
            Difficulty::Quiz
        } else {
            difficulty
        };
        Some(stage.resolve(self.defaults.rule_for(kind)))
    }
}

fn validate_sequence(
    disaster: &str,
    difficulty: Difficulty,
    stages: &[StageCfg],
) -> Result<(), ConfigError> {
    if stages.is_empty() {
        return Err(ConfigError::EmptySequence {
            disaster: disaster.to_string(),
            difficulty,
        });
    }
    let mut seen = HashSet::new();
    for stage in stages {
        if !seen.insert(stage.id.as_str()) {
            return Err(ConfigError::DuplicateStage {
                disaster: disaster.to_string(),
                difficulty,
                stage: stage.id.clone(),
            });
        }
        if let Some(pct) = stage.pass_pct
            && pct > MAX_PASS_PCT
        {
            return Err(ConfigError::PassPctOutOfRange {
                stage: stage.id.clone(),
                pct,
            });
        }
    }
    Ok(())
}

fn default_terminal_scene() -> String {
    TERMINAL_SCENE.to_string()
}
