//! A simulated validator: one consensus instance over in-memory storage.

use crate::{NodeIndex, SimulationConfig};
use atropos_abft::{
    AbftError, BlockCallbacks, Consensus, ConsensusCallbacks, IndexedLachesis, Store,
};
use atropos_kvdb::MemDbProducer;
use atropos_types::{
    log_crit, Block, Epoch, Event, EventId, EventStore, Frame, Genesis, MutableEvent,
    ValidatorId, Validators,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// A decided block as seen by one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub epoch: Epoch,
    pub atropos: EventId,
    pub cheaters: Vec<ValidatorId>,
    /// Confirmed events, in delivery order.
    pub events: Vec<EventId>,
}

#[derive(Debug)]
struct RecorderState {
    blocks: Vec<BlockRecord>,
    epoch: Epoch,
    validators: Validators,
    blocks_in_epoch: usize,
    seal_every: Option<usize>,
}

/// Validator set of the epoch after `epoch`: the same validators with one
/// weight bumped, so that every epoch runs a different set.
pub fn next_validators(validators: &Validators, epoch: Epoch) -> Validators {
    let mut builder = validators.builder();
    let index = epoch.0 as usize % validators.len().max(1);
    if let Some(id) = validators.id_at(index) {
        builder.set(id, validators.weight_at(index) + 1);
    }
    builder.build()
}

/// Application side of a node: records blocks and seals epochs.
struct BlockRecorder {
    state: Arc<Mutex<RecorderState>>,
}

struct PendingBlock<'a> {
    state: &'a Mutex<RecorderState>,
    block: Block,
    events: Vec<EventId>,
}

impl ConsensusCallbacks for BlockRecorder {
    fn begin_block<'a>(&'a mut self, block: &Block) -> Box<dyn BlockCallbacks + 'a> {
        Box::new(PendingBlock {
            state: &self.state,
            block: block.clone(),
            events: Vec::new(),
        })
    }
}

impl BlockCallbacks for PendingBlock<'_> {
    fn apply_event(&mut self, event: &Event) {
        self.events.push(event.id());
    }

    fn end_block(self: Box<Self>) -> Option<Validators> {
        let PendingBlock {
            state,
            block,
            events,
        } = *self;
        let mut state = state.lock();
        let epoch = state.epoch;
        state.blocks.push(BlockRecord {
            epoch,
            atropos: block.atropos,
            cheaters: block.cheaters,
            events,
        });
        state.blocks_in_epoch += 1;

        if state.seal_every != Some(state.blocks_in_epoch) {
            return None;
        }
        let validators = next_validators(&state.validators, epoch);
        state.epoch = epoch.next();
        state.validators = validators.clone();
        state.blocks_in_epoch = 0;
        Some(validators)
    }
}

/// One simulated validator.
///
/// Keeps its own event store and databases, so snapshots model a node that
/// crashed and came back with whatever it had persisted.
pub struct SimNode {
    index: NodeIndex,
    lachesis: IndexedLachesis,
    events: EventStore,
    producer: MemDbProducer,
    recorder: Arc<Mutex<RecorderState>>,
    config: SimulationConfig,
}

impl SimNode {
    /// Create a node and apply `genesis` to its fresh storage.
    pub fn new(
        index: NodeIndex,
        genesis: &Genesis,
        config: &SimulationConfig,
    ) -> Result<Self, AbftError> {
        let producer = MemDbProducer::new();
        let mut store = Store::open(Arc::new(producer.clone()), config.abft.store.clone())?;
        store.apply_genesis(genesis)?;
        drop(store);
        Self::open(index, producer, EventStore::new(), Vec::new(), config)
    }

    fn open(
        index: NodeIndex,
        producer: MemDbProducer,
        events: EventStore,
        blocks: Vec<BlockRecord>,
        config: &SimulationConfig,
    ) -> Result<Self, AbftError> {
        let mut lachesis = IndexedLachesis::open(
            Arc::new(producer.clone()),
            Arc::new(events.clone()),
            log_crit(),
            &config.abft,
        )?;
        let store = lachesis.store();
        let recorder = Arc::new(Mutex::new(RecorderState {
            blocks,
            epoch: store.epoch()?,
            validators: store.validators()?.clone(),
            // One block per decided frame.
            blocks_in_epoch: store.last_decided_frame()?.0 as usize,
            seal_every: config.seal_every,
        }));
        lachesis.bootstrap(Box::new(BlockRecorder {
            state: recorder.clone(),
        }))?;
        debug!(node = index, "Node opened");

        Ok(Self {
            index,
            lachesis,
            events,
            producer,
            recorder,
            config: config.clone(),
        })
    }

    /// A new instance over a copy of everything this node persisted.
    ///
    /// Blocks recorded so far are carried over so the restarted node's
    /// history stays comparable.
    pub fn restart(&self) -> Result<Self, AbftError> {
        info!(node = self.index, "Restarting node from snapshot");
        Self::open(
            self.index,
            self.producer.snapshot(),
            self.events.snapshot(),
            self.blocks(),
            &self.config,
        )
    }

    pub fn index(&self) -> NodeIndex {
        self.index
    }

    /// Make `event` available to consensus and process it.
    pub fn process(&mut self, event: &Event) -> Result<(), AbftError> {
        self.events.insert(event.clone());
        self.lachesis.process(event)
    }

    pub fn build(&mut self, event: &mut MutableEvent) -> Result<(), AbftError> {
        self.lachesis.build(event)
    }

    pub fn blocks(&self) -> Vec<BlockRecord> {
        self.recorder.lock().blocks.clone()
    }

    pub fn epoch(&self) -> Result<Epoch, AbftError> {
        self.lachesis.store().epoch()
    }

    pub fn validators(&self) -> Result<Validators, AbftError> {
        Ok(self.lachesis.store().validators()?.clone())
    }

    pub fn last_decided_frame(&self) -> Result<Frame, AbftError> {
        self.lachesis.store().last_decided_frame()
    }

    pub fn branch_count(&self) -> usize {
        self.lachesis.indexer().branch_count()
    }

    /// Validators `id` observes forking.
    pub fn cheaters_of(&self, id: &EventId) -> Result<Vec<ValidatorId>, AbftError> {
        Ok(self.lachesis.indexer().cheaters(id)?)
    }

    pub fn is_halted(&self) -> bool {
        self.lachesis.is_halted()
    }
}

impl std::fmt::Debug for SimNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimNode")
            .field("index", &self.index)
            .field("lachesis", &self.lachesis)
            .field("blocks", &self.recorder.lock().blocks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_validators_rotates_bumped_weight() {
        let validators = Validators::equal((1..=4).map(ValidatorId));
        let next = next_validators(&validators, Epoch(1));
        assert_eq!(next.len(), 4);
        assert_eq!(next.total_weight(), 5);
        assert_eq!(next.weight(ValidatorId(2)), 2);
        assert_eq!(next.sorted_ids()[0], ValidatorId(2));
    }

    #[test]
    fn test_node_starts_at_genesis() {
        let genesis = Genesis {
            epoch: Epoch::FIRST,
            validators: Validators::equal((1..=4).map(ValidatorId)),
        };
        let node = SimNode::new(0, &genesis, &SimulationConfig::default()).unwrap();
        assert_eq!(node.epoch().unwrap(), Epoch::FIRST);
        assert_eq!(node.last_decided_frame().unwrap(), Frame::ZERO);
        assert_eq!(node.branch_count(), 4);
        assert!(node.blocks().is_empty());

        let restarted = node.restart().unwrap();
        assert_eq!(restarted.validators().unwrap(), genesis.validators);
    }
}
