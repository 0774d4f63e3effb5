//! Metrics collection and reporting for seed sweeps.

use atropos_simulation::SimulationReport;
use atropos_types::{Epoch, ValidatorId};
use std::collections::BTreeSet;
use std::time::Duration;

/// Collects per-run reports during a sweep.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    runs: u64,
    events: u64,
    blocks: u64,
    rejected: u64,
    replays: u64,
    max_epoch: Epoch,
    cheaters: BTreeSet<ValidatorId>,
    /// Seeds whose replays diverged from the reference node.
    diverged_seeds: Vec<u64>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished run.
    pub fn record(&mut self, report: &SimulationReport) {
        self.runs += 1;
        self.events += report.events as u64;
        self.blocks += report.blocks as u64;
        self.rejected += report.rejected() as u64;
        self.replays += report.nodes.len() as u64;
        self.max_epoch = self.max_epoch.max(report.final_epoch);
        self.cheaters.extend(report.cheaters.iter().copied());
        if !report.is_consistent() {
            self.diverged_seeds.push(report.seed);
        }
    }

    pub fn finalize(self, duration: Duration) -> SweepReport {
        let secs = duration.as_secs_f64();
        SweepReport {
            runs: self.runs,
            events: self.events,
            blocks: self.blocks,
            rejected: self.rejected,
            replays: self.replays,
            max_epoch: self.max_epoch,
            cheaters: self.cheaters,
            diverged_seeds: self.diverged_seeds,
            events_per_sec: if secs > 0.0 {
                (self.events * (1 + self.replays.checked_div(self.runs).unwrap_or(0))) as f64
                    / secs
            } else {
                0.0
            },
            duration,
        }
    }
}

/// Aggregated results of a sweep.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub runs: u64,
    /// Generated events, summed over runs.
    pub events: u64,
    /// Reference blocks, summed over runs.
    pub blocks: u64,
    /// Non-fatal rejections during replay, summed over runs and nodes.
    pub rejected: u64,
    pub replays: u64,
    pub max_epoch: Epoch,
    pub cheaters: BTreeSet<ValidatorId>,
    pub diverged_seeds: Vec<u64>,
    /// Events processed per wall-clock second, generation and replays included.
    pub events_per_sec: f64,
    pub duration: Duration,
}

impl SweepReport {
    pub fn is_consistent(&self) -> bool {
        self.diverged_seeds.is_empty()
    }

    pub fn print_summary(&self) {
        println!("\n═══════════════════════════════════════════");
        println!("           SIMULATION REPORT                ");
        println!("═══════════════════════════════════════════");
        println!();
        println!("Runs:");
        println!("  Seeds:     {}", self.runs);
        println!("  Replays:   {}", self.replays);
        println!("  Diverged:  {:?}", self.diverged_seeds);
        println!();
        println!("DAG:");
        println!("  Events:    {}", self.events);
        println!("  Blocks:    {}", self.blocks);
        println!("  Rejected:  {} (stale during replay)", self.rejected);
        println!("  Max epoch: {}", self.max_epoch);
        println!("  Cheaters:  {:?}", self.cheaters);
        println!();
        println!("Throughput: {:.2} events/s", self.events_per_sec);
        println!("Duration:   {:?}", self.duration);
        println!("═══════════════════════════════════════════\n");
    }
}
