use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};

use super::{DisasterProgress, MiniGameProgress, ProgressBackend, StoreError};
use crate::constants::{LOG_STORE, SCHEMA_VERSION};
use crate::difficulty::Difficulty;

const PROGRESS_SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS DisasterProgress (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL UNIQUE,
  easyCompleted INTEGER NOT NULL DEFAULT 0,
  hardUnlocked INTEGER NOT NULL DEFAULT 0,
  hardCompleted INTEGER NOT NULL DEFAULT 0,
  quizCompleted INTEGER NOT NULL DEFAULT 0,
  isUnlocked INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS MiniGameProgress (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  disasterName TEXT NOT NULL,
  difficulty TEXT NOT NULL,
  miniGameIndex INTEGER NOT NULL,
  passed INTEGER NOT NULL DEFAULT 0,
  UNIQUE (disasterName, difficulty, miniGameIndex)
);
";

const DISASTER_COLUMNS: &str =
    "id, name, easyCompleted, hardUnlocked, hardCompleted, quizCompleted, isUnlocked";
const MINI_GAME_COLUMNS: &str = "id, disasterName, difficulty, miniGameIndex, passed";

/// SQLite file (or in-memory) backend.
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteBackend {
    /// Open or create the database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Open a private database that disappears with the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: None,
        })
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn schema_version(&self) -> Result<i64, StoreError> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }
}

impl ProgressBackend for SqliteBackend {
    fn create_schema(&mut self) -> Result<(), StoreError> {
        let found = self.schema_version()?;
        if found > SCHEMA_VERSION {
            return Err(StoreError::SchemaTooNew {
                found,
                supported: SCHEMA_VERSION,
            });
        }
        self.conn.execute_batch(PROGRESS_SCHEMA)?;
        if found < SCHEMA_VERSION {
            self.conn
                .pragma_update(None, "user_version", SCHEMA_VERSION)?;
            log::debug!(target: LOG_STORE, "Progress schema stamped v{SCHEMA_VERSION} (was v{found})");
        }
        Ok(())
    }

    fn seed_if_empty(&mut self, names: &[String]) -> Result<bool, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM DisasterProgress", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(false);
        }
        let mut stmt = self
            .conn
            .prepare("INSERT INTO DisasterProgress (name, isUnlocked) VALUES (?1, ?2)")?;
        for (position, name) in names.iter().enumerate() {
            stmt.execute(params![name, position == 0])?;
        }
        Ok(!names.is_empty())
    }

    fn load_disasters(&self) -> Result<Vec<DisasterProgress>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {DISASTER_COLUMNS} FROM DisasterProgress ORDER BY id"))?;
        let rows = stmt.query_map([], disaster_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn load_disaster(&self, name: &str) -> Result<Option<DisasterProgress>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {DISASTER_COLUMNS} FROM DisasterProgress WHERE name = ?1"),
                params![name],
                disaster_from_row,
            )
            .optional()?)
    }

    fn update_disaster(&mut self, row: &DisasterProgress) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE DisasterProgress SET easyCompleted = ?2, hardUnlocked = ?3, hardCompleted = ?4, \
             quizCompleted = ?5, isUnlocked = ?6 WHERE id = ?1",
            params![
                row.id,
                row.easy_completed,
                row.hard_unlocked,
                row.hard_completed,
                row.quiz_completed,
                row.is_unlocked
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::InvalidData(format!(
                "disaster row {} ({}) does not exist",
                row.id, row.name
            )));
        }
        Ok(())
    }

    fn load_all_mini_games(&self) -> Result<Vec<MiniGameProgress>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MINI_GAME_COLUMNS} FROM MiniGameProgress \
             ORDER BY disasterName, difficulty, miniGameIndex"
        ))?;
        let rows = stmt.query_map([], mini_game_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn load_mini_games(
        &self,
        disaster: &str,
        difficulty: Difficulty,
    ) -> Result<Vec<MiniGameProgress>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MINI_GAME_COLUMNS} FROM MiniGameProgress \
             WHERE disasterName = ?1 AND difficulty = ?2 ORDER BY miniGameIndex"
        ))?;
        let rows = stmt.query_map(params![disaster, difficulty.as_str()], mini_game_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn load_mini_game(
        &self,
        disaster: &str,
        difficulty: Difficulty,
        index: i32,
    ) -> Result<Option<MiniGameProgress>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {MINI_GAME_COLUMNS} FROM MiniGameProgress \
                     WHERE disasterName = ?1 AND difficulty = ?2 AND miniGameIndex = ?3"
                ),
                params![disaster, difficulty.as_str(), index],
                mini_game_from_row,
            )
            .optional()?)
    }

    fn insert_mini_game(
        &mut self,
        disaster: &str,
        difficulty: Difficulty,
        index: i32,
        passed: bool,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO MiniGameProgress (disasterName, difficulty, miniGameIndex, passed) \
             VALUES (?1, ?2, ?3, ?4)",
            params![disaster, difficulty.as_str(), index, passed],
        )?;
        Ok(())
    }

    fn update_mini_game(&mut self, row: &MiniGameProgress) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE MiniGameProgress SET passed = ?2 WHERE id = ?1",
            params![row.id, row.passed],
        )?;
        Ok(())
    }

    fn atomically<T, F>(&mut self, op: F) -> Result<T, StoreError>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T, StoreError>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match op(self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    log::error!(target: LOG_STORE, "Rollback failed: {rollback}");
                }
                Err(err)
            }
        }
    }
}

fn disaster_from_row(row: &Row<'_>) -> rusqlite::Result<DisasterProgress> {
    Ok(DisasterProgress {
        id: row.get(0)?,
        name: row.get(1)?,
        easy_completed: row.get(2)?,
        hard_unlocked: row.get(3)?,
        hard_completed: row.get(4)?,
        quiz_completed: row.get(5)?,
        is_unlocked: row.get(6)?,
    })
}

fn mini_game_from_row(row: &Row<'_>) -> rusqlite::Result<MiniGameProgress> {
    let difficulty: String = row.get(2)?;
    let difficulty = difficulty
        .parse::<Difficulty>()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(err)))?;
    Ok(MiniGameProgress {
        id: row.get(0)?,
        disaster_name: row.get(1)?,
        difficulty,
        mini_game_index: row.get(3)?,
        passed: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> SqliteBackend {
        let mut backend = SqliteBackend::open_in_memory().unwrap();
        backend.create_schema().unwrap();
        backend
    }

    #[test]
    fn schema_is_idempotent_and_versioned() {
        let mut backend = backend();
        backend.create_schema().unwrap();
        assert_eq!(backend.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn newer_schema_is_refused() {
        let mut backend = SqliteBackend::open_in_memory().unwrap();
        backend
            .conn
            .pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .unwrap();
        assert!(matches!(
            backend.create_schema(),
            Err(StoreError::SchemaTooNew { .. })
        ));
    }

    #[test]
    fn seeding_only_happens_on_an_empty_table() {
        let mut backend = backend();
        let names = vec!["Typhoon".to_string(), "Flood".to_string()];
        assert!(backend.seed_if_empty(&names).unwrap());
        assert!(!backend.seed_if_empty(&names).unwrap());
        let rows = backend.load_disasters().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_unlocked);
        assert!(!rows[1].is_unlocked);
    }

    #[test]
    fn mini_game_triple_is_unique() {
        let mut backend = backend();
        backend
            .insert_mini_game("Typhoon", Difficulty::Easy, 0, false)
            .unwrap();
        assert!(
            backend
                .insert_mini_game("Typhoon", Difficulty::Easy, 0, true)
                .is_err()
        );
    }

    #[test]
    fn failed_unit_of_work_rolls_back() {
        let mut backend = backend();
        let outcome: Result<(), StoreError> = backend.atomically(|b| {
            b.insert_mini_game("Typhoon", Difficulty::Hard, 2, true)?;
            Err(StoreError::InvalidData("abort".to_string()))
        });
        assert!(outcome.is_err());
        assert!(backend.load_all_mini_games().unwrap().is_empty());
    }

    #[test]
    fn unknown_difficulty_text_is_reported() {
        let backend = backend();
        backend
            .conn
            .execute(
                "INSERT INTO MiniGameProgress (disasterName, difficulty, miniGameIndex, passed) \
                 VALUES ('Typhoon', 'Medium', 0, 1)",
                [],
            )
            .unwrap();
        assert!(backend.load_all_mini_games().is_err());
    }
}
