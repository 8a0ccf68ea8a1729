//! Difficulty tiers and their stable string forms
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Difficulty tier of a stage.
///
/// The string forms (`"Easy"`, `"Hard"`, `"Quiz"`) are what the progress
/// database stores, so they must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Hard,
    /// Terminal quiz closing the Easy track.
    Quiz,
}

impl Difficulty {
    pub const ALL: [Self; 3] = [Self::Easy, Self::Hard, Self::Quiz];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Hard => "Hard",
            Self::Quiz => "Quiz",
        }
    }

    /// The stage sequence this tier is played in. The quiz lives at the end
    /// of the Easy sequence, so it shares the Easy track.
    #[must_use]
    pub const fn track(self) -> Self {
        match self {
            Self::Easy | Self::Quiz => Self::Easy,
            Self::Hard => Self::Hard,
        }
    }

    #[must_use]
    pub const fn is_quiz(self) -> bool {
        matches!(self, Self::Quiz)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not one of the known tiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown difficulty '{0}'")]
pub struct UnknownDifficulty(pub String);

impl FromStr for Difficulty {
    type Err = UnknownDifficulty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Easy" => Ok(Self::Easy),
            "Hard" => Ok(Self::Hard),
            "Quiz" => Ok(Self::Quiz),
            other => Err(UnknownDifficulty(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_forms_parse_back() {
        for difficulty in Difficulty::ALL {
            assert_eq!(difficulty.as_str().parse::<Difficulty>(), Ok(difficulty));
        }
    }

    #[test]
    fn parsing_is_case_sensitive() {
        assert_eq!(
            "easy".parse::<Difficulty>(),
            Err(UnknownDifficulty("easy".to_string()))
        );
    }

    #[test]
    fn quiz_shares_the_easy_track() {
        assert_eq!(Difficulty::Quiz.track(), Difficulty::Easy);
        assert_eq!(Difficulty::Hard.track(), Difficulty::Hard);
    }
}
