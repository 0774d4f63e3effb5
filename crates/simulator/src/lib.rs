//! Seed sweeps over the atropos consensus simulation.
//!
//! A [`Simulator`] runs the same scenario under consecutive seeds and
//! aggregates the per-run reports into a [`SweepReport`].

mod metrics;
mod runner;

pub use metrics::{MetricsCollector, SweepReport};
pub use runner::{Simulator, SimulatorConfig, SimulatorError};
