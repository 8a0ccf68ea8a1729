use super::{DisasterProgress, MiniGameProgress, ProgressBackend, StoreError};
use crate::difficulty::Difficulty;

/// Volatile backend for tests and throwaway sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    disasters: Vec<DisasterProgress>,
    mini_games: Vec<MiniGameProgress>,
    next_id: i64,
}

impl MemoryBackend {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn find_mini_game(&self, disaster: &str, difficulty: Difficulty, index: i32) -> Option<usize> {
        self.mini_games.iter().position(|row| {
            row.disaster_name == disaster
                && row.difficulty == difficulty
                && row.mini_game_index == index
        })
    }
}

impl ProgressBackend for MemoryBackend {
    fn create_schema(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn seed_if_empty(&mut self, names: &[String]) -> Result<bool, StoreError> {
        if !self.disasters.is_empty() {
            return Ok(false);
        }
        for (position, name) in names.iter().enumerate() {
            let id = self.allocate_id();
            self.disasters.push(DisasterProgress {
                id,
                name: name.clone(),
                easy_completed: false,
                hard_unlocked: false,
                hard_completed: false,
                quiz_completed: false,
                is_unlocked: position == 0,
            });
        }
        Ok(!names.is_empty())
    }

    fn load_disasters(&self) -> Result<Vec<DisasterProgress>, StoreError> {
        Ok(self.disasters.clone())
    }

    fn load_disaster(&self, name: &str) -> Result<Option<DisasterProgress>, StoreError> {
        Ok(self.disasters.iter().find(|row| row.name == name).cloned())
    }

    fn update_disaster(&mut self, row: &DisasterProgress) -> Result<(), StoreError> {
        let slot = self
            .disasters
            .iter_mut()
            .find(|existing| existing.id == row.id)
            .ok_or_else(|| {
                StoreError::InvalidData(format!("disaster row {} ({}) does not exist", row.id, row.name))
            })?;
        *slot = row.clone();
        Ok(())
    }

    fn load_all_mini_games(&self) -> Result<Vec<MiniGameProgress>, StoreError> {
        let mut rows = self.mini_games.clone();
        rows.sort_by(|a, b| {
            (a.disaster_name.as_str(), a.difficulty.as_str(), a.mini_game_index).cmp(&(
                b.disaster_name.as_str(),
                b.difficulty.as_str(),
                b.mini_game_index,
            ))
        });
        Ok(rows)
    }

    fn load_mini_games(
        &self,
        disaster: &str,
        difficulty: Difficulty,
    ) -> Result<Vec<MiniGameProgress>, StoreError> {
        let mut rows: Vec<MiniGameProgress> = self
            .mini_games
            .iter()
            .filter(|row| row.disaster_name == disaster && row.difficulty == difficulty)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.mini_game_index);
        Ok(rows)
    }

    fn load_mini_game(
        &self,
        disaster: &str,
        difficulty: Difficulty,
        index: i32,
    ) -> Result<Option<MiniGameProgress>, StoreError> {
        Ok(self
            .find_mini_game(disaster, difficulty, index)
            .map(|position| self.mini_games[position].clone()))
    }

    fn insert_mini_game(
        &mut self,
        disaster: &str,
        difficulty: Difficulty,
        index: i32,
        passed: bool,
    ) -> Result<(), StoreError> {
        if self.find_mini_game(disaster, difficulty, index).is_some() {
            return Err(StoreError::InvalidData(format!(
                "{disaster} {difficulty} #{index} already recorded"
            )));
        }
        let id = self.allocate_id();
        self.mini_games.push(MiniGameProgress {
            id,
            disaster_name: disaster.to_string(),
            difficulty,
            mini_game_index: index,
            passed,
        });
        Ok(())
    }

    fn update_mini_game(&mut self, row: &MiniGameProgress) -> Result<(), StoreError> {
        if let Some(existing) = self.mini_games.iter_mut().find(|existing| existing.id == row.id) {
            existing.passed = row.passed;
        }
        Ok(())
    }

    fn atomically<T, F>(&mut self, op: F) -> Result<T, StoreError>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T, StoreError>,
    {
        let snapshot = self.clone();
        match op(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                *self = snapshot;
                Err(err)
            }
        }
    }
}
