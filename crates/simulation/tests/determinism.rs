//! Same seed, same history; any delivery order, same blocks.

use atropos_simulation::{SimulationConfig, SimulationRunner};
use proptest::prelude::*;
use tracing_test::traced_test;

fn run(config: SimulationConfig) -> atropos_simulation::SimulationReport {
    SimulationRunner::new(config)
        .expect("valid config")
        .run()
        .expect("simulation runs")
}

#[traced_test]
#[test]
fn test_replays_agree_with_reference() {
    let report = run(SimulationConfig::new(4, 300).with_nodes(4));

    assert_eq!(report.events, 300);
    assert!(report.blocks > 0, "no frame was decided");
    assert!(report.is_consistent(), "diverged: {:?}", report.diverged());
    assert_eq!(report.rejected(), 0);
    assert!(logs_contain("Simulation complete"));
}

#[test]
fn test_same_seed_same_report() {
    let config = SimulationConfig::new(5, 200).with_max_weight(3).with_seed(1234);
    let first = run(config.clone());
    let second = run(config);

    assert_eq!(first.blocks, second.blocks);
    assert_eq!(first.final_epoch, second.final_epoch);
    assert_eq!(first.nodes, second.nodes);
}

#[test]
fn test_different_seeds_differ() {
    let first = run(SimulationConfig::new(4, 200).with_seed(1));
    let second = run(SimulationConfig::new(4, 200).with_seed(2));
    assert!(first.is_consistent() && second.is_consistent());
    assert!(first.blocks != second.blocks || first.nodes != second.nodes);
}

#[test]
fn test_weighted_validators_agree() {
    let report = run(
        SimulationConfig::new(7, 400)
            .with_max_weight(5)
            .with_max_parents(5)
            .with_seed(99),
    );
    assert!(report.blocks > 0);
    assert!(report.is_consistent(), "diverged: {:?}", report.diverged());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_any_seed_is_consistent(
        seed in any::<u64>(),
        validators in 3u32..7,
        max_parents in 2usize..5,
    ) {
        let report = run(
            SimulationConfig::new(validators, 150)
                .with_max_parents(max_parents)
                .with_nodes(2)
                .with_seed(seed),
        );
        prop_assert!(report.is_consistent());
    }
}
