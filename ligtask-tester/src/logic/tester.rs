use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use ligtask_progress::{
    BundledData, DEFAULT_DB_FILE, ProgressBackend, ProgressionEngine, ProgressionService,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::playthrough::Playthrough;
use super::scenarios::Scenario;

/// Where each iteration keeps its progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Volatile in-memory tables
    Memory,
    /// A scratch SQLite save file per iteration
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    /// Stage completions reported across every iteration.
    pub total_steps: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_millis")]
    pub average_duration: Duration,
}

pub struct LogicTester {
    engine: ProgressionEngine<BundledData>,
    backend: Backend,
    verbose: bool,
}

impl LogicTester {
    pub fn new(backend: Backend, verbose: bool) -> Self {
        Self {
            engine: ProgressionEngine::default(),
            backend,
            verbose,
        }
    }

    pub fn run_scenario(&self, scenario: Scenario, seeds: &[u64], iterations: usize) -> Vec<ScenarioResult> {
        seeds
            .iter()
            .map(|&seed| {
                if self.verbose {
                    println!(
                        "🧪 Testing scenario: {} (backend: {:?} seed: {seed})",
                        scenario.key().bright_white(),
                        self.backend
                    );
                }
                self.run_single_scenario(scenario, seed, iterations)
            })
            .collect()
    }

    fn run_single_scenario(&self, scenario: Scenario, seed: u64, iterations: usize) -> ScenarioResult {
        let mut successes = 0;
        let mut total_steps = 0;
        let mut failures = Vec::new();
        let mut timings = Vec::new();

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));

            match self.run_iteration(scenario, iteration_seed) {
                Ok(steps) => {
                    successes += 1;
                    total_steps += steps;
                    let duration = start_time.elapsed();
                    timings.push(duration);
                    if self.verbose {
                        println!(
                            "  ✅ Iteration {}/{iterations} passed ({duration:?}) steps:{steps}",
                            i + 1
                        );
                    }
                }
                Err(err) => {
                    let message = format!("Iteration {} (seed {iteration_seed}): {err:#}", i + 1);
                    if self.verbose {
                        println!("  ❌ {}", message.clone().red());
                    }
                    failures.push(message);
                }
            }
        }

        let average_duration = if timings.is_empty() {
            Duration::ZERO
        } else {
            timings.iter().sum::<Duration>() / u32::try_from(timings.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: scenario.key().to_string(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            total_steps,
            failures,
            average_duration,
        }
    }

    fn run_iteration(&self, scenario: Scenario, seed: u64) -> Result<usize> {
        match self.backend {
            Backend::Memory => drive(scenario, self.engine.in_memory()?, seed),
            Backend::Sqlite => {
                let dir = tempfile::tempdir().context("creating scratch save directory")?;
                let service = self.engine.open_file(dir.path().join(DEFAULT_DB_FILE))?;
                drive(scenario, service, seed)
            }
        }
    }
}

fn drive<B: ProgressBackend>(scenario: Scenario, service: ProgressionService<B>, seed: u64) -> Result<usize> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut playthrough = Playthrough::new(service)?;
    scenario.run(&mut playthrough, &mut rng)?;
    Ok(playthrough.steps())
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
