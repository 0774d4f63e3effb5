//! Seeded random DAG generation.

use crate::{BlockRecord, SimNode, SimulationConfig, SimulationError};
use atropos_types::{Epoch, Event, Genesis, MutableEvent, ValidatorId, Validators, Weight};
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::{debug, info, trace};

/// Genesis with validators `1..=config.validators` and random weights.
pub fn random_genesis(
    config: &SimulationConfig,
    rng: &mut ChaCha8Rng,
) -> Result<Genesis, SimulationError> {
    let validators = Validators::new(
        (1..=config.validators)
            .map(|id| (ValidatorId(id), rng.gen_range(1..=config.max_weight)))
            .collect::<Vec<_>>(),
    );
    let cheaters_weight: Weight = (1..=config.cheaters)
        .map(|id| validators.weight(ValidatorId(id)))
        .sum();
    if config.cheaters > 0 && cheaters_weight * 3 >= validators.total_weight() {
        return Err(SimulationError::InvalidConfig(format!(
            "cheaters hold {cheaters_weight} of {} weight",
            validators.total_weight()
        )));
    }
    Ok(Genesis {
        epoch: Epoch::FIRST,
        validators,
    })
}

/// Output of a generation run.
#[derive(Debug, Clone)]
pub struct GeneratedDag {
    pub genesis: Genesis,
    /// Events in creation order.
    pub events: Vec<Event>,
    /// Blocks decided by the generating node.
    pub blocks: Vec<BlockRecord>,
    /// Epoch the generating node ended in.
    pub final_epoch: Epoch,
}

/// Creates random events, one at a time, through a reference node.
///
/// Each step picks a random creator, links its latest event (or, for a
/// cheater, sometimes a sibling of it) and up to `max_parents - 1` latest
/// events of other validators. Parents whose creator the self-parent saw
/// forking are skipped, as honest nodes must. The reference node assigns
/// the frame and processes the event before the next one is made.
pub struct DagGenerator {
    config: SimulationConfig,
    rng: ChaCha8Rng,
    reference: SimNode,
    genesis: Genesis,
    epoch: Epoch,
    /// Current epoch's events by creator, in creation order.
    lanes: BTreeMap<ValidatorId, Vec<Event>>,
    events: Vec<Event>,
}

impl DagGenerator {
    pub fn new(
        config: &SimulationConfig,
        genesis: Genesis,
        seed: u64,
    ) -> Result<Self, SimulationError> {
        let reference = SimNode::new(u32::MAX, &genesis, config)?;
        Ok(Self {
            config: config.clone(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            reference,
            epoch: genesis.epoch,
            genesis,
            lanes: BTreeMap::new(),
            events: Vec::with_capacity(config.events),
        })
    }

    pub fn generate(mut self) -> Result<GeneratedDag, SimulationError> {
        while self.events.len() < self.config.events {
            self.step()?;
        }
        let blocks = self.reference.blocks();
        let final_epoch = self.reference.epoch()?;
        info!(
            events = self.events.len(),
            blocks = blocks.len(),
            epoch = final_epoch.0,
            "DAG generated"
        );
        Ok(GeneratedDag {
            genesis: self.genesis,
            events: self.events,
            blocks,
            final_epoch,
        })
    }

    fn step(&mut self) -> Result<(), SimulationError> {
        let epoch = self.reference.epoch()?;
        if epoch != self.epoch {
            debug!(epoch = epoch.0, "Generator switched epoch");
            self.epoch = epoch;
            self.lanes.clear();
        }
        let validators = self.reference.validators()?;
        let creator = validators.sorted_ids()[self.rng.gen_range(0..validators.len())];

        let self_parent = self.pick_self_parent(creator);
        let parents = self.pick_parents(creator, self_parent.as_ref())?;
        let lamport = parents.iter().map(Event::lamport).max().unwrap_or(0) + 1;

        let mut draft = MutableEvent {
            epoch,
            seq: self_parent.as_ref().map_or(1, |p| p.seq() + 1),
            creator,
            lamport,
            parents: parents.iter().map(Event::id).collect(),
            creation_time: lamport as u64 * 1_000 + self.rng.gen_range(0..1_000),
            extra: (self.events.len() as u64).to_be_bytes().to_vec(),
            ..Default::default()
        };
        self.reference.build(&mut draft)?;
        let event = draft.build();
        self.reference.process(&event)?;
        trace!(
            event = %event.id(),
            creator = creator.0,
            frame = event.frame().0,
            is_root = event.is_root(),
            "Event generated"
        );

        self.lanes.entry(creator).or_default().push(event.clone());
        self.events.push(event);
        Ok(())
    }

    fn is_cheater(&self, creator: ValidatorId) -> bool {
        creator.0 <= self.config.cheaters
    }

    /// None means the event starts a lane (seq 1).
    fn pick_self_parent(&mut self, creator: ValidatorId) -> Option<Event> {
        let forks = self.is_cheater(creator) && self.rng.gen_bool(self.config.fork_probability);
        let lane = self.lanes.get(&creator)?;
        let last = lane.last()?;
        if !forks {
            return Some(last.clone());
        }
        // A sibling of the latest event.
        let grandparent = last.self_parent()?;
        lane.iter().find(|e| e.id() == grandparent).cloned()
    }

    fn pick_parents(
        &mut self,
        creator: ValidatorId,
        self_parent: Option<&Event>,
    ) -> Result<Vec<Event>, SimulationError> {
        let cheaters = match self_parent {
            Some(parent) => self.reference.cheaters_of(&parent.id())?,
            None => Vec::new(),
        };
        let mut candidates: Vec<&Event> = self
            .lanes
            .iter()
            .filter(|(id, _)| **id != creator && !cheaters.contains(id))
            .filter_map(|(_, lane)| lane.last())
            .collect();
        candidates.shuffle(&mut self.rng);

        let slots = self
            .config
            .max_parents
            .saturating_sub(usize::from(self_parent.is_some()));
        let mut parents: Vec<Event> = self_parent.cloned().into_iter().collect();
        parents.extend(candidates.into_iter().take(slots).cloned());
        Ok(parents)
    }
}

impl std::fmt::Debug for DagGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DagGenerator")
            .field("epoch", &self.epoch.0)
            .field("events", &self.events.len())
            .field("lanes", &self.lanes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_dag() {
        let config = SimulationConfig::new(4, 60);
        let generate = || {
            let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
            let genesis = random_genesis(&config, &mut rng).unwrap();
            DagGenerator::new(&config, genesis, rng.gen())
                .unwrap()
                .generate()
                .unwrap()
        };
        let first = generate();
        let second = generate();
        assert_eq!(first.events, second.events);
        assert_eq!(first.blocks, second.blocks);
    }

    #[test]
    fn test_frames_advance_by_at_most_one() {
        let config = SimulationConfig::new(5, 150).with_max_parents(4);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let genesis = random_genesis(&config, &mut rng).unwrap();
        let dag = DagGenerator::new(&config, genesis, 7)
            .unwrap()
            .generate()
            .unwrap();

        let by_id: BTreeMap<_, _> = dag.events.iter().map(|e| (e.id(), e)).collect();
        for event in &dag.events {
            match event.self_parent() {
                None => assert_eq!(event.frame().0, 1),
                Some(parent) => {
                    let spf = by_id[&parent].frame();
                    let expected = if event.is_root() { spf.next() } else { spf };
                    assert_eq!(event.frame(), expected);
                }
            }
        }
        assert!(!dag.blocks.is_empty());
    }

    #[test]
    fn test_heavy_cheaters_rejected() {
        let config = SimulationConfig::new(4, 10)
            .with_max_weight(1)
            .with_cheaters(2, 0.5);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(matches!(
            random_genesis(&config, &mut rng),
            Err(SimulationError::InvalidConfig(_))
        ));
    }
}
