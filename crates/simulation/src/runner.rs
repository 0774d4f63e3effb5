//! Deterministic simulation runner.
//!
//! Generates one DAG through a reference node, then replays it into
//! independent nodes in different random orders, optionally restarting
//! each node from a snapshot midway. Every node must end up with exactly
//! the reference node's blocks.

use crate::generator::{random_genesis, DagGenerator, GeneratedDag};
use crate::order::random_topological_order;
use crate::{NodeIndex, SimNode, SimulationConfig, SimulationError};
use atropos_types::{Epoch, ValidatorId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, trace, warn};

/// Outcome of replaying the DAG into one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    pub index: NodeIndex,
    pub blocks: usize,
    pub epoch: Epoch,
    /// Events refused with a non-fatal error (stale epoch, missing parent).
    pub rejected: usize,
    /// Position in the delivery order at which the node was restarted.
    pub restarted_at: Option<usize>,
    /// Whether the node's blocks equal the reference node's.
    pub consistent: bool,
}

/// Results of one simulation run.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub seed: u64,
    pub events: usize,
    pub blocks: usize,
    pub final_epoch: Epoch,
    /// Every validator some block reported as a cheater.
    pub cheaters: BTreeSet<ValidatorId>,
    pub nodes: Vec<NodeReport>,
}

impl SimulationReport {
    /// All replay nodes agree with the reference node.
    pub fn is_consistent(&self) -> bool {
        self.nodes.iter().all(|n| n.consistent)
    }

    pub fn diverged(&self) -> Vec<NodeIndex> {
        self.nodes
            .iter()
            .filter(|n| !n.consistent)
            .map(|n| n.index)
            .collect()
    }

    pub fn rejected(&self) -> usize {
        self.nodes.iter().map(|n| n.rejected).sum()
    }
}

/// Deterministic simulation runner.
///
/// Given the same configuration (seed included), produces identical results
/// every run.
pub struct SimulationRunner {
    config: SimulationConfig,
    rng: ChaCha8Rng,
}

impl SimulationRunner {
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate().map_err(SimulationError::InvalidConfig)?;
        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Generate the DAG and replay it into every node.
    #[instrument(skip(self), fields(seed = self.config.seed))]
    pub fn run(&mut self) -> Result<SimulationReport, SimulationError> {
        let genesis = random_genesis(&self.config, &mut self.rng)?;
        info!(
            validators = genesis.validators.len(),
            total_weight = genesis.validators.total_weight(),
            "Starting simulation"
        );
        let dag = DagGenerator::new(&self.config, genesis, self.rng.gen())?.generate()?;

        let nodes = (0..self.config.nodes)
            .map(|index| self.replay(index, &dag))
            .collect::<Result<Vec<_>, _>>()?;

        let report = SimulationReport {
            seed: self.config.seed,
            events: dag.events.len(),
            blocks: dag.blocks.len(),
            final_epoch: dag.final_epoch,
            cheaters: dag
                .blocks
                .iter()
                .flat_map(|b| b.cheaters.iter().copied())
                .collect(),
            nodes,
        };
        info!(
            blocks = report.blocks,
            epoch = report.final_epoch.0,
            rejected = report.rejected(),
            consistent = report.is_consistent(),
            "Simulation complete"
        );
        Ok(report)
    }

    fn replay(
        &mut self,
        index: NodeIndex,
        dag: &GeneratedDag,
    ) -> Result<NodeReport, SimulationError> {
        let order = random_topological_order(&dag.events, &mut self.rng);
        let restarted_at = self
            .config
            .restarts
            .then(|| self.rng.gen_range(0..=order.len()));

        let mut node = SimNode::new(index, &dag.genesis, &self.config)?;
        let mut rejected = 0;
        for (position, event) in order.iter().enumerate() {
            if restarted_at == Some(position) {
                node = node.restart()?;
            }
            match node.process(event) {
                Ok(()) => {}
                Err(err) if !err.is_fatal() => {
                    trace!(node = index, event = %event.id(), error = %err, "Event rejected");
                    rejected += 1;
                }
                Err(source) => return Err(SimulationError::Consensus { node: index, source }),
            }
        }
        if restarted_at == Some(order.len()) {
            node = node.restart()?;
        }

        let blocks = node.blocks();
        let consistent = blocks == dag.blocks;
        if consistent {
            debug!(node = index, blocks = blocks.len(), rejected, "Replay matches");
        } else {
            warn!(
                node = index,
                blocks = blocks.len(),
                expected = dag.blocks.len(),
                "Replay diverged from reference"
            );
        }
        Ok(NodeReport {
            index,
            blocks: blocks.len(),
            epoch: node.epoch()?,
            rejected,
            restarted_at,
            consistent,
        })
    }
}

impl std::fmt::Debug for SimulationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationRunner")
            .field("config", &self.config)
            .finish()
    }
}
