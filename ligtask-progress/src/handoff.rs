//! Transient result of the stage that just finished
use serde::{Deserialize, Serialize};

use crate::difficulty::Difficulty;

/// What a finished stage hands to the transition screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultHandoff {
    pub score: i32,
    pub max_score: i32,
    pub passed: bool,
    pub disaster_name: String,
    pub difficulty: Difficulty,
    pub stage_index: i32,
    /// Stage id resolved from the index, when the sequence knows it.
    pub stage_id: Option<String>,
}

impl ResultHandoff {
    /// Only a passed stage lets the player continue to the next one.
    #[must_use]
    pub const fn allows_continue(&self) -> bool {
        self.passed
    }

    /// Label of the retry button on the transition screen.
    #[must_use]
    pub const fn retry_label(&self) -> &'static str {
        if self.passed { "Play Again" } else { "Retry" }
    }

    #[must_use]
    pub const fn headline(&self) -> &'static str {
        if self.passed { "You Passed!" } else { "Try Again" }
    }
}

/// Single-slot holder: each completion overwrites it, the reader takes it.
#[derive(Debug, Clone, Default)]
pub struct ResultSlot {
    latest: Option<ResultHandoff>,
}

impl ResultSlot {
    pub fn store(&mut self, handoff: ResultHandoff) {
        self.latest = Some(handoff);
    }

    #[must_use]
    pub const fn peek(&self) -> Option<&ResultHandoff> {
        self.latest.as_ref()
    }

    /// Read the pending result once.
    pub fn take(&mut self) -> Option<ResultHandoff> {
        self.latest.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handoff(score: i32, passed: bool) -> ResultHandoff {
        ResultHandoff {
            score,
            max_score: 100,
            passed,
            disaster_name: "Flood".to_string(),
            difficulty: Difficulty::Easy,
            stage_index: 1,
            stage_id: Some("MoveItems".to_string()),
        }
    }

    #[test]
    fn slot_keeps_only_the_latest_and_reads_once() {
        let mut slot = ResultSlot::default();
        slot.store(handoff(40, false));
        slot.store(handoff(80, true));
        assert_eq!(slot.peek().map(|h| h.score), Some(80));
        assert_eq!(slot.take().map(|h| h.score), Some(80));
        assert!(slot.take().is_none());
    }

    #[test]
    fn labels_follow_the_outcome() {
        let failed = handoff(10, false);
        assert!(!failed.allows_continue());
        assert_eq!(failed.retry_label(), "Retry");
        assert_eq!(failed.headline(), "Try Again");
        let passed = handoff(90, true);
        assert_eq!(passed.retry_label(), "Play Again");
        assert_eq!(passed.headline(), "You Passed!");
    }
}
