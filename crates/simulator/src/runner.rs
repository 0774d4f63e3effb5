//! Main simulator runner.

use crate::metrics::{MetricsCollector, SweepReport};
use atropos_simulation::{SimulationConfig, SimulationError, SimulationRunner};
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

/// Errors from a sweep.
#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("sweep needs at least one run")]
    NoRuns,

    #[error("seed {seed}: {source}")]
    Run {
        seed: u64,
        #[source]
        source: SimulationError,
    },
}

/// Sweep configuration.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Scenario for every run; its seed is the first seed of the sweep.
    pub simulation: SimulationConfig,
    /// Number of consecutive seeds to run.
    pub runs: u32,
    /// Stop at the first run whose replays diverge.
    pub fail_fast: bool,
}

impl SimulatorConfig {
    pub fn new(simulation: SimulationConfig) -> Self {
        Self {
            simulation,
            runs: 1,
            fail_fast: false,
        }
    }

    /// Set the number of runs.
    pub fn with_runs(mut self, runs: u32) -> Self {
        self.runs = runs;
        self
    }

    /// Set whether to stop at the first divergence.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

/// Runs a scenario under consecutive seeds and aggregates the results.
#[derive(Debug)]
pub struct Simulator {
    config: SimulatorConfig,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Result<Self, SimulatorError> {
        if config.runs == 0 {
            return Err(SimulatorError::NoRuns);
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn run(&self) -> Result<SweepReport, SimulatorError> {
        let started = Instant::now();
        let mut metrics = MetricsCollector::new();
        let first = self.config.simulation.seed;

        for seed in (0..u64::from(self.config.runs)).map(|i| first.wrapping_add(i)) {
            let simulation = self.config.simulation.clone().with_seed(seed);
            let report = SimulationRunner::new(simulation)
                .and_then(|mut runner| runner.run())
                .map_err(|source| SimulatorError::Run { seed, source })?;
            metrics.record(&report);

            if !report.is_consistent() {
                warn!(seed, diverged = ?report.diverged(), "Run diverged");
                if self.config.fail_fast {
                    break;
                }
            } else {
                info!(seed, blocks = report.blocks, epoch = report.final_epoch.0, "Run passed");
            }
        }
        Ok(metrics.finalize(started.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_pattern() {
        let config = SimulatorConfig::new(SimulationConfig::default())
            .with_runs(5)
            .with_fail_fast(true);
        assert_eq!(config.runs, 5);
        assert!(config.fail_fast);
    }

    #[test]
    fn test_zero_runs_refused() {
        let config = SimulatorConfig::new(SimulationConfig::default()).with_runs(0);
        assert!(matches!(Simulator::new(config), Err(SimulatorError::NoRuns)));
    }
}
