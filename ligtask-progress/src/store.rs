//! Durable disaster and minigame progress
//!
//! [`ProgressStore`] owns the progression invariants (monotone upsert,
//! unlock cascade, seed-once) and delegates row storage to a
//! [`ProgressBackend`]. A store only exists initialized: [`ProgressStore::open`]
//! creates the schema and seeds before handing it out, and is the only place
//! that reports errors. Every other operation logs failures and degrades to a
//! no-op or an empty answer.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::constants::LOG_STORE;
use crate::difficulty::Difficulty;

mod memory;
mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

/// Errors raised by the progress backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("could not open progress database at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("progress database schema v{found} is newer than supported v{supported}")]
    SchemaTooNew { found: i64, supported: i64 },
    #[error("invalid stored data: {0}")]
    InvalidData(String),
}

/// One row per disaster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisasterProgress {
    pub id: i64,
    pub name: String,
    pub easy_completed: bool,
    pub hard_unlocked: bool,
    pub hard_completed: bool,
    pub quiz_completed: bool,
    pub is_unlocked: bool,
}

/// One row per (disaster, difficulty, minigame index).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiniGameProgress {
    pub id: i64,
    pub disaster_name: String,
    pub difficulty: Difficulty,
    pub mini_game_index: i32,
    pub passed: bool,
}

/// Row-level storage behind a [`ProgressStore`].
///
/// Implementations only move rows; the progression rules live in the store.
pub trait ProgressBackend {
    /// Create both tables if they are absent. Must be idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unavailable or corrupt.
    fn create_schema(&mut self) -> Result<(), StoreError>;

    /// Insert the disasters in order when the disaster table is empty, the
    /// first one unlocked. Returns whether anything was inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows cannot be written.
    fn seed_if_empty(&mut self, names: &[String]) -> Result<bool, StoreError>;

    /// All disaster rows in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows cannot be read.
    fn load_disasters(&self) -> Result<Vec<DisasterProgress>, StoreError>;

    /// # Errors
    ///
    /// Returns an error if the row cannot be read.
    fn load_disaster(&self, name: &str) -> Result<Option<DisasterProgress>, StoreError>;

    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    fn update_disaster(&mut self, row: &DisasterProgress) -> Result<(), StoreError>;

    /// All minigame rows, ordered by disaster, difficulty and index.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows cannot be read.
    fn load_all_mini_games(&self) -> Result<Vec<MiniGameProgress>, StoreError>;

    /// Minigame rows of one (disaster, difficulty), ordered by index.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows cannot be read.
    fn load_mini_games(
        &self,
        disaster: &str,
        difficulty: Difficulty,
    ) -> Result<Vec<MiniGameProgress>, StoreError>;

    /// # Errors
    ///
    /// Returns an error if the row cannot be read.
    fn load_mini_game(
        &self,
        disaster: &str,
        difficulty: Difficulty,
        index: i32,
    ) -> Result<Option<MiniGameProgress>, StoreError>;

    /// # Errors
    ///
    /// Returns an error if the row cannot be written or already exists.
    fn insert_mini_game(
        &mut self,
        disaster: &str,
        difficulty: Difficulty,
        index: i32,
        passed: bool,
    ) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    fn update_mini_game(&mut self, row: &MiniGameProgress) -> Result<(), StoreError>;

    /// Run `op` as one exclusive unit of work.
    ///
    /// # Errors
    ///
    /// Returns the error of `op`, or an error if the unit cannot be committed.
    fn atomically<T, F>(&mut self, op: F) -> Result<T, StoreError>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T, StoreError>,
    {
        op(self)
    }
}

/// Progress persistence with the progression invariants enforced in one place.
#[derive(Debug)]
pub struct ProgressStore<B: ProgressBackend> {
    backend: B,
    order: Vec<String>,
}

impl<B: ProgressBackend> ProgressStore<B> {
    /// Wrap a backend and initialize it. `order` is the fixed disaster
    /// ordering used for seeding and for finding the successor to unlock.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unavailable or corrupt.
    pub fn open<I, S>(backend: B, order: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut store = Self {
            backend,
            order: order.into_iter().map(Into::into).collect(),
        };
        store.init()?;
        Ok(store)
    }

    /// Create any missing tables and seed the disaster list if the disaster
    /// table is empty. Repeating it leaves existing rows untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unavailable or corrupt.
    pub fn init(&mut self) -> Result<(), StoreError> {
        self.backend.create_schema()?;
        let order = &self.order;
        if self.backend.atomically(|backend| backend.seed_if_empty(order))? {
            log::info!(target: LOG_STORE, "Seeded default disaster data ({} disasters)", order.len());
        }
        Ok(())
    }

    /// Disaster names in unlock order.
    #[must_use]
    pub fn disaster_order(&self) -> &[String] {
        &self.order
    }

    /// Look up a disaster by name. Unknown names yield `None`.
    #[must_use]
    pub fn get_disaster_progress(&self, name: &str) -> Option<DisasterProgress> {
        self.backend
            .load_disaster(name)
            .unwrap_or_else(|err| {
                log::error!(target: LOG_STORE, "Failed to read progress for {name}: {err}");
                None
            })
    }

    /// Every stage row recorded for a disaster and difficulty.
    #[must_use]
    pub fn get_mini_game_progress(
        &self,
        name: &str,
        difficulty: Difficulty,
    ) -> Vec<MiniGameProgress> {
        self.backend
            .load_mini_games(name, difficulty)
            .unwrap_or_else(|err| {
                log::error!(target: LOG_STORE, "Failed to read {name} {difficulty} minigames: {err}");
                Vec::new()
            })
    }

    /// Whether a particular stage has been passed.
    #[must_use]
    pub fn is_stage_passed(&self, name: &str, difficulty: Difficulty, index: i32) -> bool {
        match self.backend.load_mini_game(name, difficulty, index) {
            Ok(row) => row.is_some_and(|row| row.passed),
            Err(err) => {
                log::error!(target: LOG_STORE, "Failed to read {name} {difficulty} #{index}: {err}");
                false
            }
        }
    }

    /// Every disaster row in unlock order.
    #[must_use]
    pub fn list_disaster_progress(&self) -> Vec<DisasterProgress> {
        self.backend.load_disasters().unwrap_or_else(|err| {
            log::error!(target: LOG_STORE, "Failed to list disaster progress: {err}");
            Vec::new()
        })
    }

    /// Every minigame row.
    #[must_use]
    pub fn list_mini_game_progress(&self) -> Vec<MiniGameProgress> {
        self.backend.load_all_mini_games().unwrap_or_else(|err| {
            log::error!(target: LOG_STORE, "Failed to list minigame progress: {err}");
            Vec::new()
        })
    }

    /// Record a stage result. An existing row is only ever upgraded from
    /// failed to passed; a failing retry never clears an earlier pass.
    pub fn upsert_mini_game_result(
        &mut self,
        name: &str,
        difficulty: Difficulty,
        index: i32,
        passed: bool,
    ) {
        if !self.knows(name) {
            return;
        }
        let outcome = self.backend.atomically(|backend| {
            match backend.load_mini_game(name, difficulty, index)? {
                Some(mut row) => {
                    if passed && !row.passed {
                        row.passed = true;
                        backend.update_mini_game(&row)?;
                    }
                }
                None => backend.insert_mini_game(name, difficulty, index, passed)?,
            }
            Ok(())
        });
        if let Err(err) = outcome {
            log::error!(target: LOG_STORE, "Failed to record {name} {difficulty} #{index}: {err}");
        }
    }

    /// Apply the disaster-level flags for a passed stage. Passing the quiz
    /// unlocks Hard and the next disaster.
    pub fn apply_disaster_level_effects(&mut self, name: &str, difficulty: Difficulty, passed: bool) {
        if !passed || !self.knows(name) {
            return;
        }
        let order = &self.order;
        let outcome = self.backend.atomically(|backend| {
            let Some(mut row) = backend.load_disaster(name)? else {
                log::warn!(target: LOG_STORE, "No progress row for disaster {name}");
                return Ok(());
            };
            let before = row.clone();
            match difficulty {
                Difficulty::Easy => row.easy_completed = true,
                Difficulty::Hard => row.hard_completed = true,
                Difficulty::Quiz => {
                    row.quiz_completed = true;
                    row.hard_unlocked = true;
                }
            }
            if row != before {
                backend.update_disaster(&row)?;
            }
            if difficulty.is_quiz() {
                unlock_successor(backend, order, name)?;
            }
            Ok(())
        });
        if let Err(err) = outcome {
            log::error!(target: LOG_STORE, "Failed to update {name} after {difficulty}: {err}");
        }
    }

    /// Unlock the disaster that follows `name` in the fixed ordering.
    pub fn unlock_next_disaster(&mut self, name: &str) {
        if !self.knows(name) {
            return;
        }
        let order = &self.order;
        if let Err(err) = self
            .backend
            .atomically(|backend| unlock_successor(backend, order, name).map(drop))
        {
            log::error!(target: LOG_STORE, "Failed to unlock the disaster after {name}: {err}");
        }
    }

    fn knows(&self, name: &str) -> bool {
        let known = self.order.iter().any(|candidate| candidate == name);
        if !known {
            log::warn!(target: LOG_STORE, "Ignoring unknown disaster '{name}'");
        }
        known
    }
}

fn unlock_successor<B: ProgressBackend>(
    backend: &mut B,
    order: &[String],
    name: &str,
) -> Result<bool, StoreError> {
    let Some(position) = order.iter().position(|candidate| candidate == name) else {
        return Ok(false);
    };
    let Some(next) = order.get(position + 1) else {
        log::debug!(target: LOG_STORE, "{name} is the last disaster, nothing to unlock");
        return Ok(false);
    };
    match backend.load_disaster(next)? {
        Some(mut row) if !row.is_unlocked => {
            row.is_unlocked = true;
            backend.update_disaster(&row)?;
            log::info!(target: LOG_STORE, "Unlocked {next} after completing {name}");
            Ok(true)
        }
        Some(_) => Ok(false),
        None => {
            log::warn!(target: LOG_STORE, "No progress row for successor {next}");
            Ok(false)
        }
    }
}
