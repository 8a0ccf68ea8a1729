//! LigTask Progression Engine
//!
//! Platform-agnostic progression and persistence for the LigTask
//! disaster-preparedness minigames: pass/fail scoring, durable unlock state,
//! stage navigation and the result handed to the transition screen.
//! Rendering, input and minigame mechanics live elsewhere.

pub mod config;
pub mod constants;
pub mod difficulty;
pub mod handoff;
pub mod registry;
pub mod scoring;
pub mod service;
pub mod store;

use anyhow::Context;
use std::path::Path;

// Re-export commonly used types
pub use config::{ConfigError, DisasterCfg, ProgressionConfig, StageCfg};
pub use constants::{DEFAULT_DB_FILE, TERMINAL_SCENE};
pub use difficulty::{Difficulty, UnknownDifficulty};
pub use handoff::{ResultHandoff, ResultSlot};
pub use registry::{NextStage, Selection, StageRegistry, sequence_key};
pub use scoring::{Rounding, ScoringPolicy, ThresholdRule, clamp_score, evaluate};
pub use service::ProgressionService;
pub use store::{
    DisasterProgress, MemoryBackend, MiniGameProgress, ProgressBackend, ProgressStore,
    SqliteBackend, StoreError,
};

/// Trait for abstracting where the progression table comes from
/// Platform-specific implementations should provide this
pub trait DataLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the disaster ordering, stage sequences and thresholds
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be loaded or fails validation.
    fn load_progression(&self) -> Result<ProgressionConfig, Self::Error>;
}

/// Loader for the table bundled with the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledData;

impl DataLoader for BundledData {
    type Error = ConfigError;

    fn load_progression(&self) -> Result<ProgressionConfig, Self::Error> {
        ProgressionConfig::load_from_static()
    }
}

/// Builds ready-to-use services from a loader and a backend.
pub struct ProgressionEngine<L = BundledData>
where
    L: DataLoader,
{
    data_loader: L,
}

impl<L> ProgressionEngine<L>
where
    L: DataLoader,
{
    pub const fn new(data_loader: L) -> Self {
        Self { data_loader }
    }

    /// Load the table and initialize `backend` with it.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be loaded or the store cannot be
    /// initialized.
    pub fn bootstrap<B: ProgressBackend>(&self, backend: B) -> anyhow::Result<ProgressionService<B>> {
        let config = self
            .data_loader
            .load_progression()
            .context("loading progression table")?;
        let service =
            ProgressionService::new(config, backend).context("initializing progress store")?;
        log::debug!(
            target: constants::LOG_SERVICE,
            "Progression ready with {} disasters",
            service.store().disaster_order().len()
        );
        Ok(service)
    }

    /// Open (or create) the save file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or holds an incompatible
    /// or corrupt database.
    pub fn open_file(&self, path: impl AsRef<Path>) -> anyhow::Result<ProgressionService<SqliteBackend>> {
        let path = path.as_ref();
        let backend = SqliteBackend::open(path)?;
        self.bootstrap(backend)
            .with_context(|| format!("opening progress at {}", path.display()))
    }

    /// A session that forgets everything when dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be loaded.
    pub fn in_memory(&self) -> anyhow::Result<ProgressionService<MemoryBackend>> {
        self.bootstrap(MemoryBackend::default())
    }
}

impl Default for ProgressionEngine<BundledData> {
    fn default() -> Self {
        Self::new(BundledData)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Default)]
    struct TwoDisasters;

    impl DataLoader for TwoDisasters {
        type Error = ConfigError;

        fn load_progression(&self) -> Result<ProgressionConfig, Self::Error> {
            ProgressionConfig::from_json(
                r#"{
                    "disasters": [
                        { "name": "Storm", "easy": [{ "id": "StormA" }, { "id": "StormQuiz" }],
                          "hard": [{ "id": "StormHard" }] },
                        { "name": "Quake", "easy": [{ "id": "QuakeA" }, { "id": "QuakeQuiz" }],
                          "hard": [{ "id": "QuakeHard" }] }
                    ]
                }"#,
            )
        }
    }

    struct BrokenLoader;

    impl DataLoader for BrokenLoader {
        type Error = ConfigError;

        fn load_progression(&self) -> Result<ProgressionConfig, Self::Error> {
            ProgressionConfig::from_json(r#"{ "disasters": [] }"#)
        }
    }

    #[test]
    fn bundled_engine_seeds_five_disasters() {
        let service = ProgressionEngine::default().in_memory().unwrap();
        let names: Vec<_> = service
            .store()
            .list_disaster_progress()
            .into_iter()
            .map(|row| row.name)
            .collect();
        assert_eq!(names, ["Typhoon", "Earthquake", "Flood", "Landslide", "Volcano"]);
    }

    #[test]
    fn custom_loader_drives_ordering_and_sequences() {
        let mut service = ProgressionEngine::new(TwoDisasters).in_memory().unwrap();
        assert_eq!(service.store().disaster_order(), ["Storm", "Quake"]);
        let handoff = service.complete_stage("Storm", Difficulty::Quiz, 1, 7, 10);
        assert!(handoff.passed);
        assert!(service.store().get_disaster_progress("Quake").unwrap().is_unlocked);
        assert_eq!(
            service.next_stage("Storm", Difficulty::Easy),
            Some(NextStage::Complete)
        );
    }

    #[test]
    fn invalid_table_fails_bootstrap() {
        let err = ProgressionEngine::new(BrokenLoader).in_memory().unwrap_err();
        assert!(format!("{err:#}").contains("loading progression table"));
    }
}
