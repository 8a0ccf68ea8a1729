//! Centralized constants for the progression engine.

// Storage ------------------------------------------------------------------
/// File name of the on-disk progress database.
pub const DEFAULT_DB_FILE: &str = "ligtask.db";
/// Version stamped into `PRAGMA user_version`. Schema changes are additive only.
pub(crate) const SCHEMA_VERSION: i64 = 1;

// Navigation ---------------------------------------------------------------
/// Scene loaded once a stage sequence has been played through.
pub const TERMINAL_SCENE: &str = "LevelCompleteScene";

// Scoring ------------------------------------------------------------------
pub(crate) const EASY_PASS_PCT: u8 = 60;
pub(crate) const HARD_PASS_PCT: u8 = 60;
pub(crate) const QUIZ_PASS_PCT: u8 = 70;
pub(crate) const MAX_PASS_PCT: u8 = 100;

// Logging targets ----------------------------------------------------------
pub(crate) const LOG_STORE: &str = "ligtask::store";
pub(crate) const LOG_REGISTRY: &str = "ligtask::registry";
pub(crate) const LOG_SERVICE: &str = "ligtask::service";
