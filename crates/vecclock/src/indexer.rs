//! Object-safe view of the vector engine used by consensus.

use crate::{VecClockError, VectorEngine, VectorScheme};
use atropos_kvdb::KvStore;
use atropos_types::{Event, EventId, ValidatorId, Validators};
use std::sync::Arc;

/// DAG index consumed by the orderer.
///
/// Implemented by [`VectorEngine`] for every scheme, so the orderer doesn't
/// care which vector encoding is in use.
pub trait DagIndexer: Send {
    fn reset(&mut self, validators: &Validators, db: Arc<dyn KvStore>)
        -> Result<(), VecClockError>;

    fn add(&mut self, event: &Event) -> Result<(), VecClockError>;

    fn flush(&mut self) -> Result<(), VecClockError>;

    fn drop_not_flushed(&mut self) -> Result<(), VecClockError>;

    fn forkless_cause(&self, a: &EventId, b: &EventId) -> Result<bool, VecClockError>;

    /// Validators `id` observes forking, in validator index order.
    fn cheaters(&self, id: &EventId) -> Result<Vec<ValidatorId>, VecClockError>;

    /// Number of branches, validators included.
    fn branch_count(&self) -> usize;
}

impl<S: VectorScheme> DagIndexer for VectorEngine<S> {
    fn reset(
        &mut self,
        validators: &Validators,
        db: Arc<dyn KvStore>,
    ) -> Result<(), VecClockError> {
        VectorEngine::reset(self, validators, db)
    }

    fn add(&mut self, event: &Event) -> Result<(), VecClockError> {
        VectorEngine::add(self, event)
    }

    fn flush(&mut self) -> Result<(), VecClockError> {
        VectorEngine::flush(self)
    }

    fn drop_not_flushed(&mut self) -> Result<(), VecClockError> {
        VectorEngine::drop_not_flushed(self)
    }

    fn forkless_cause(&self, a: &EventId, b: &EventId) -> Result<bool, VecClockError> {
        VectorEngine::forkless_cause(self, a, b)
    }

    fn cheaters(&self, id: &EventId) -> Result<Vec<ValidatorId>, VecClockError> {
        VectorEngine::cheaters(self, id)
    }

    fn branch_count(&self) -> usize {
        VectorEngine::branch_count(self)
    }
}
