//! Atropos deterministic simulator CLI.
//!
//! # Example
//!
//! ```bash
//! # Ten seeds, 4 validators, 1000 events each
//! atropos-sim --runs 10 --events 1000
//!
//! # Two forking validators out of seven, new epoch every 5 blocks
//! atropos-sim -v 7 --cheaters 2 --fork-probability 0.2 --seal-every 5 --restarts
//! ```

use anyhow::{bail, Context};
use atropos_simulation::SimulationConfig;
use atropos_simulator::{Simulator, SimulatorConfig};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Atropos Deterministic Simulator
///
/// Generates random event DAGs, replays them into independent nodes in
/// random orders and checks every node decides the same blocks. Given the
/// same seed, produces identical results every run.
#[derive(Parser, Debug)]
#[command(name = "atropos-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of validators
    #[arg(short = 'v', long, default_value = "4")]
    validators: u32,

    /// Maximum validator weight (weights are drawn from 1..=max)
    #[arg(long, default_value = "1")]
    max_weight: u64,

    /// Events generated per run
    #[arg(short = 'e', long, default_value = "400")]
    events: usize,

    /// Maximum parents per event, self-parent included
    #[arg(short = 'p', long, default_value = "3")]
    max_parents: usize,

    /// Number of forking validators
    #[arg(long, default_value = "0")]
    cheaters: u32,

    /// Probability that a cheater forks (0.0-1.0)
    #[arg(long, default_value = "0.1")]
    fork_probability: f64,

    /// Seal the epoch every N blocks
    #[arg(long)]
    seal_every: Option<usize>,

    /// Replay nodes per run
    #[arg(short = 'n', long, default_value = "3")]
    nodes: u32,

    /// Restart every replay node once from a storage snapshot
    #[arg(long)]
    restarts: bool,

    /// First random seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Number of consecutive seeds to run
    #[arg(short = 'r', long, default_value = "1")]
    runs: u32,

    /// Stop at the first diverging run
    #[arg(long)]
    fail_fast: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,atropos_sim=info,atropos_simulator=info")),
        )
        .init();

    let args = Args::parse();

    info!(
        validators = args.validators,
        events = args.events,
        cheaters = args.cheaters,
        nodes = args.nodes,
        seed = args.seed,
        runs = args.runs,
        "Starting simulation"
    );

    let mut simulation = SimulationConfig::new(args.validators, args.events)
        .with_max_weight(args.max_weight)
        .with_max_parents(args.max_parents)
        .with_cheaters(args.cheaters, args.fork_probability)
        .with_nodes(args.nodes)
        .with_restarts(args.restarts)
        .with_seed(args.seed);
    if let Some(blocks) = args.seal_every {
        simulation = simulation.with_seal_every(blocks);
    }

    let config = SimulatorConfig::new(simulation)
        .with_runs(args.runs)
        .with_fail_fast(args.fail_fast);
    let report = Simulator::new(config)
        .context("failed to create simulator")?
        .run()
        .context("simulation failed")?;

    report.print_summary();

    if !report.is_consistent() {
        bail!("replays diverged for seeds {:?}", report.diverged_seeds);
    }
    Ok(())
}
