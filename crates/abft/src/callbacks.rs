//! Seams between the consensus core and its embedder.

use crate::{AbftError, Store};
use atropos_types::{Block, Epoch, Event, EventId, EventSource, Frame, MutableEvent, Validators};
use atropos_vecclock::DagIndexer;

/// Read access to the orderer's state while a frame is being applied.
pub struct OrdererView<'a> {
    pub store: &'a Store,
    pub indexer: &'a dyn DagIndexer,
    pub events: &'a dyn EventSource,
}

/// Hooks the [`crate::Orderer`] calls on decisions and epoch switches.
pub trait OrdererCallbacks {
    /// A frame got its Atropos. Returning validators seals the epoch.
    fn apply_atropos(
        &mut self,
        view: &OrdererView<'_>,
        frame: Frame,
        atropos: EventId,
    ) -> Result<Option<Validators>, AbftError>;

    /// The epoch's database is open and the indexer has been reset onto it.
    fn epoch_db_loaded(&mut self, _epoch: Epoch) {}
}

/// Application hooks for decided blocks.
pub trait ConsensusCallbacks {
    /// Start a block. The returned handle receives the block's events.
    fn begin_block<'a>(&'a mut self, block: &Block) -> Box<dyn BlockCallbacks + 'a>;
}

/// Receives the events of one block.
pub trait BlockCallbacks {
    /// Called once for every newly confirmed event.
    fn apply_event(&mut self, event: &Event);

    /// Finish the block. Returning validators seals the epoch and starts the
    /// next one with that set.
    fn end_block(self: Box<Self>) -> Option<Validators>;
}

/// The consensus surface exposed to the node.
pub trait Consensus {
    /// Validate and consume an event whose parents were all processed.
    fn process(&mut self, event: &Event) -> Result<(), AbftError>;

    /// Fill in the frame and root flag of a locally created event.
    fn build(&mut self, event: &mut MutableEvent) -> Result<(), AbftError>;

    /// Drop the current epoch and start `epoch` with `validators`.
    fn reset(&mut self, epoch: Epoch, validators: Validators) -> Result<(), AbftError>;
}
