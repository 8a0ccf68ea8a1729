//! Pass/fail thresholds for finished stages
use serde::{Deserialize, Serialize};

use crate::constants::{EASY_PASS_PCT, HARD_PASS_PCT, QUIZ_PASS_PCT};
use crate::difficulty::Difficulty;

/// Rounding applied when turning a pass percentage into a score threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rounding {
    /// Round to the nearest integer, halves going up
    Nearest,
    /// Always round down (floor)
    Down,
    /// Always round up (ceiling). Equivalent to `score >= pct * max`.
    #[default]
    Up,
}

/// Pass percentage plus the rounding used to derive the threshold score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub pass_pct: u8,
    #[serde(default)]
    pub rounding: Rounding,
}

impl ThresholdRule {
    #[must_use]
    pub const fn new(pass_pct: u8, rounding: Rounding) -> Self {
        Self { pass_pct, rounding }
    }

    #[must_use]
    pub const fn ceil(pass_pct: u8) -> Self {
        Self::new(pass_pct, Rounding::Up)
    }

    /// Minimum score needed to pass out of `max_score`.
    #[must_use]
    pub fn threshold(self, max_score: i32) -> i64 {
        let product = i64::from(max_score.max(0)) * i64::from(self.pass_pct);
        match self.rounding {
            Rounding::Up => (product + 99) / 100,
            Rounding::Nearest => (product + 50) / 100,
            Rounding::Down => product / 100,
        }
    }

    /// Whether `score` clears this rule. A non-positive maximum never passes.
    #[must_use]
    pub fn passes(self, score: i32, max_score: i32) -> bool {
        if max_score <= 0 {
            return false;
        }
        i64::from(score) >= self.threshold(max_score)
    }
}

/// Default threshold per difficulty tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    pub easy: ThresholdRule,
    pub hard: ThresholdRule,
    pub quiz: ThresholdRule,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            easy: ThresholdRule::ceil(EASY_PASS_PCT),
            hard: ThresholdRule::ceil(HARD_PASS_PCT),
            quiz: ThresholdRule::ceil(QUIZ_PASS_PCT),
        }
    }
}

impl ScoringPolicy {
    #[must_use]
    pub const fn rule_for(&self, kind: Difficulty) -> ThresholdRule {
        match kind {
            Difficulty::Easy => self.easy,
            Difficulty::Hard => self.hard,
            Difficulty::Quiz => self.quiz,
        }
    }

    /// Evaluate a score against the tier default.
    #[must_use]
    pub fn evaluate(&self, kind: Difficulty, score: i32, max_possible_score: i32) -> bool {
        self.rule_for(kind).passes(score, max_possible_score)
    }
}

/// Evaluate a score against the stock thresholds (Easy/Hard 60%, Quiz 70%).
#[must_use]
pub fn evaluate(kind: Difficulty, score: i32, max_possible_score: i32) -> bool {
    ScoringPolicy::default().evaluate(kind, score, max_possible_score)
}

/// Clamp a raw score into `[0, max_score]`.
#[must_use]
pub fn clamp_score(score: i32, max_score: i32) -> i32 {
    score.clamp(0, max_score.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_thresholds_match_the_rule_table() {
        assert!(evaluate(Difficulty::Easy, 60, 100));
        assert!(!evaluate(Difficulty::Easy, 59, 100));
        assert!(evaluate(Difficulty::Hard, 60, 100));
        assert!(!evaluate(Difficulty::Hard, 59, 100));
        assert!(evaluate(Difficulty::Quiz, 70, 100));
        assert!(!evaluate(Difficulty::Quiz, 69, 100));
    }

    #[test]
    fn ceiling_matches_exact_ratio_on_uneven_maxima() {
        // 0.7 * 9 = 6.3, so 6 fails and 7 passes.
        let rule = ThresholdRule::ceil(70);
        assert_eq!(rule.threshold(9), 7);
        assert!(!rule.passes(6, 9));
        assert!(rule.passes(7, 9));
    }

    #[test]
    fn rounding_modes_differ_only_on_fractions() {
        let nearest = ThresholdRule::new(70, Rounding::Nearest);
        let down = ThresholdRule::new(70, Rounding::Down);
        assert_eq!(nearest.threshold(9), 6);
        assert_eq!(down.threshold(9), 6);
        assert_eq!(nearest.threshold(15), 11);
        assert_eq!(down.threshold(15), 10);
        assert_eq!(ThresholdRule::ceil(70).threshold(100), 70);
        assert_eq!(nearest.threshold(100), 70);
    }

    #[test]
    fn zero_maximum_never_passes() {
        assert!(!evaluate(Difficulty::Easy, 0, 0));
        assert!(!evaluate(Difficulty::Quiz, 10, -5));
    }

    #[test]
    fn clamp_keeps_scores_in_range() {
        assert_eq!(clamp_score(-4, 100), 0);
        assert_eq!(clamp_score(140, 100), 100);
        assert_eq!(clamp_score(55, 100), 55);
        assert_eq!(clamp_score(5, -1), 0);
    }

    #[test]
    fn rounding_parses_lowercase() {
        let rule: ThresholdRule = serde_json::from_str(r#"{"pass_pct":65,"rounding":"nearest"}"#)
            .unwrap();
        assert_eq!(rule, ThresholdRule::new(65, Rounding::Nearest));
        let defaulted: ThresholdRule = serde_json::from_str(r#"{"pass_pct":60}"#).unwrap();
        assert_eq!(defaulted.rounding, Rounding::Up);
    }
}
