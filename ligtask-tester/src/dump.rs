//! Debug listing of a save file's progress tables
use anyhow::Result;
use ligtask_progress::{DisasterProgress, MiniGameProgress, ProgressBackend, ProgressStore};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
pub struct TableDump {
    pub disasters: Vec<DisasterProgress>,
    pub mini_games: Vec<MiniGameProgress>,
}

impl TableDump {
    pub fn capture<B: ProgressBackend>(store: &ProgressStore<B>) -> Self {
        Self {
            disasters: store.list_disaster_progress(),
            mini_games: store.list_mini_game_progress(),
        }
    }

    pub fn write_json<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        writeln!(out, "{}", serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn write_text<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        writeln!(out, "DisasterProgress ({} rows)", self.disasters.len())?;
        for row in &self.disasters {
            writeln!(
                out,
                "  ID: {}, Name: {}, Unlocked: {}, Easy: {}, Quiz: {}, HardUnlocked: {}, Hard: {}",
                row.id,
                row.name,
                row.is_unlocked,
                row.easy_completed,
                row.quiz_completed,
                row.hard_unlocked,
                row.hard_completed
            )?;
        }
        writeln!(out, "MiniGameProgress ({} rows)", self.mini_games.len())?;
        for row in &self.mini_games {
            writeln!(
                out,
                "  ID: {}, Disaster: {}, Difficulty: {}, Index: {}, Passed: {}",
                row.id, row.disaster_name, row.difficulty, row.mini_game_index, row.passed
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ligtask_progress::{Difficulty, ProgressionEngine};

    #[test]
    fn text_dump_lists_both_tables() {
        let mut service = ProgressionEngine::default().in_memory().unwrap();
        service.complete_stage("Typhoon", Difficulty::Easy, 0, 90, 100);
        let dump = TableDump::capture(service.store());

        let mut buf = Vec::new();
        dump.write_text(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("DisasterProgress (5 rows)"));
        assert!(text.contains("Name: Typhoon, Unlocked: true, Easy: true"));
        assert!(text.contains("Disaster: Typhoon, Difficulty: Easy, Index: 0, Passed: true"));
    }

    #[test]
    fn json_dump_is_structured() {
        let service = ProgressionEngine::default().in_memory().unwrap();
        let mut buf = Vec::new();
        TableDump::capture(service.store()).write_json(&mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["disasters"].as_array().map(Vec::len), Some(5));
        assert_eq!(value["mini_games"].as_array().map(Vec::len), Some(0));
    }
}
