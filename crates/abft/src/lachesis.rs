//! Block production on top of the orderer.

use crate::{AbftError, ConsensusCallbacks, Orderer, OrdererCallbacks, OrdererView, Store};
use atropos_types::{
    Block, CritHandler, Epoch, Event, EventId, EventSource, Frame, MutableEvent, Validators,
};
use atropos_vecclock::DagIndexer;
use std::sync::Arc;
use tracing::debug;

/// Turns Atropos decisions into blocks for [`ConsensusCallbacks`].
struct BlockProducer {
    callbacks: Box<dyn ConsensusCallbacks>,
}

impl OrdererCallbacks for BlockProducer {
    fn apply_atropos(
        &mut self,
        view: &OrdererView<'_>,
        frame: Frame,
        atropos: EventId,
    ) -> Result<Option<Validators>, AbftError> {
        let block = Block {
            atropos,
            cheaters: view.indexer.cheaters(&atropos)?,
        };
        let mut block_callbacks = self.callbacks.begin_block(&block);

        // Depth-first from the Atropos over events no earlier block took.
        let mut confirmed = 0usize;
        let mut stack = vec![atropos];
        while let Some(id) = stack.pop() {
            if view.store.event_confirmed_on(&id)? != Frame::ZERO {
                continue;
            }
            let event = view
                .events
                .get_event(&id)
                .ok_or(AbftError::EventNotFound(id))?;
            view.store.set_event_confirmed_on(&id, frame)?;
            block_callbacks.apply_event(&event);
            confirmed += 1;
            stack.extend(event.parents().iter().copied());
        }

        debug!(
            frame = frame.0,
            confirmed,
            cheaters = block.cheaters.len(),
            "Block applied"
        );
        Ok(block_callbacks.end_block())
    }
}

/// Orderer that emits blocks.
///
/// Expects every event to be indexed before it reaches [`Lachesis::process`]
/// or [`Lachesis::build`]; see [`crate::IndexedLachesis`] for the variant
/// that indexes on its own.
#[derive(Debug)]
pub struct Lachesis {
    orderer: Orderer,
}

impl Lachesis {
    pub fn new(
        store: Store,
        input: Arc<dyn EventSource>,
        indexer: Box<dyn DagIndexer>,
        crit: CritHandler,
    ) -> Self {
        Self {
            orderer: Orderer::new(store, input, indexer, crit),
        }
    }

    /// Load the current epoch and replay undecided roots, delivering any
    /// resulting blocks to `callbacks`.
    pub fn bootstrap(&mut self, callbacks: Box<dyn ConsensusCallbacks>) -> Result<(), AbftError> {
        self.orderer.bootstrap(Box::new(BlockProducer { callbacks }))
    }

    pub fn process(&mut self, event: &Event) -> Result<(), AbftError> {
        self.orderer.process(event)
    }

    pub fn build(&mut self, event: &mut MutableEvent) -> Result<(), AbftError> {
        self.orderer.build(event)
    }

    pub fn reset(&mut self, epoch: Epoch, validators: Validators) -> Result<(), AbftError> {
        self.orderer.reset(epoch, validators)
    }

    pub fn orderer(&self) -> &Orderer {
        &self.orderer
    }

    pub(crate) fn orderer_mut(&mut self) -> &mut Orderer {
        &mut self.orderer
    }

    pub fn store(&self) -> &Store {
        self.orderer.store()
    }
}
