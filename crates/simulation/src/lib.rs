//! Deterministic simulation of the atropos consensus core.
//!
//! A seeded run does three things:
//!
//! - **Generate**: [`DagGenerator`] creates random events (forks included,
//!   when cheaters are configured) through a reference [`SimNode`].
//! - **Replay**: every other node receives the same events in its own
//!   random causal order, optionally restarting from a storage snapshot.
//! - **Compare**: [`SimulationReport`] records whether each node decided
//!   exactly the reference node's blocks.
//!
//! Everything, including delivery orders and restart points, is derived
//! from [`SimulationConfig::seed`].

mod config;
mod generator;
mod node;
mod order;
mod runner;

use atropos_abft::AbftError;
use thiserror::Error;

pub use config::SimulationConfig;
pub use generator::{random_genesis, DagGenerator, GeneratedDag};
pub use node::{next_validators, BlockRecord, SimNode};
pub use order::random_topological_order;
pub use runner::{NodeReport, SimulationReport, SimulationRunner};

/// Index of a simulated node.
pub type NodeIndex = u32;

/// Errors that stop a simulation run.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid simulation config: {0}")]
    InvalidConfig(String),

    #[error("consensus error: {0}")]
    Abft(#[from] AbftError),

    #[error("node {node} failed: {source}")]
    Consensus {
        node: NodeIndex,
        #[source]
        source: AbftError,
    },
}
