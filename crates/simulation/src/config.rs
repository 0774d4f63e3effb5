//! Configuration for a simulation run.

use atropos_abft::AbftConfig;
use atropos_types::Weight;

/// Configuration for a simulation run.
///
/// One reference node generates a random DAG, assigning frames through its
/// own consensus instance. Every replay node then processes the same events
/// in its own random topological order; all of them must end up with the
/// reference's blocks.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Number of validators in the genesis set.
    pub validators: u32,
    /// Validator weights are drawn from `1..=max_weight` (1 means equal).
    pub max_weight: Weight,
    /// Total events to generate.
    pub events: usize,
    /// Maximum parents per event, self-parent included.
    pub max_parents: usize,
    /// How many validators (the lowest IDs) create forks.
    pub cheaters: u32,
    /// Probability that a cheater's event forks its own lane.
    pub fork_probability: f64,
    /// Seal the epoch after this many blocks.
    pub seal_every: Option<usize>,
    /// Number of replay nodes.
    pub nodes: u32,
    /// Restart every replay node once, at a random point, from a snapshot.
    pub restarts: bool,
    /// Random seed; the whole run is a function of it.
    pub seed: u64,
    /// Consensus configuration used by every node.
    pub abft: AbftConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new(4, 400)
    }
}

impl SimulationConfig {
    /// Create a new configuration with defaults.
    pub fn new(validators: u32, events: usize) -> Self {
        Self {
            validators,
            max_weight: 1,
            events,
            max_parents: 3,
            cheaters: 0,
            fork_probability: 0.1,
            seal_every: None,
            nodes: 3,
            restarts: false,
            seed: 42,
            abft: AbftConfig::default(),
        }
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the maximum validator weight.
    pub fn with_max_weight(mut self, max_weight: Weight) -> Self {
        self.max_weight = max_weight;
        self
    }

    /// Set the maximum number of parents.
    pub fn with_max_parents(mut self, max_parents: usize) -> Self {
        self.max_parents = max_parents;
        self
    }

    /// Set the number of forking validators and how often they fork.
    pub fn with_cheaters(mut self, cheaters: u32, fork_probability: f64) -> Self {
        self.cheaters = cheaters;
        self.fork_probability = fork_probability;
        self
    }

    /// Set the epoch length in blocks.
    pub fn with_seal_every(mut self, blocks: usize) -> Self {
        self.seal_every = Some(blocks);
        self
    }

    /// Set the number of replay nodes.
    pub fn with_nodes(mut self, nodes: u32) -> Self {
        self.nodes = nodes;
        self
    }

    /// Enable restarts of replay nodes.
    pub fn with_restarts(mut self, restarts: bool) -> Self {
        self.restarts = restarts;
        self
    }

    /// Set consensus configuration.
    pub fn with_abft(mut self, abft: AbftConfig) -> Self {
        self.abft = abft;
        self
    }

    /// Check the parameters can produce a live run.
    ///
    /// Cheaters must stay strictly below a third of the validators, which
    /// with `max_weight > 1` is only a heuristic; the generator re-checks
    /// against the drawn weights.
    pub fn validate(&self) -> Result<(), String> {
        if self.validators == 0 {
            return Err("at least one validator is required".to_string());
        }
        if self.max_weight == 0 {
            return Err("max_weight must be positive".to_string());
        }
        if self.max_parents == 0 {
            return Err("max_parents must be positive".to_string());
        }
        if self.cheaters * 3 >= self.validators && self.cheaters > 0 {
            return Err(format!(
                "{} cheaters out of {} validators break the 1/3 bound",
                self.cheaters, self.validators
            ));
        }
        if !(0.0..=1.0).contains(&self.fork_probability) {
            return Err("fork_probability must be within [0, 1]".to_string());
        }
        if self.seal_every == Some(0) {
            return Err("seal_every must be positive".to_string());
        }
        Ok(())
    }
}
