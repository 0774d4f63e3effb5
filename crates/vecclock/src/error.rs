//! Error types.

use atropos_kvdb::StoreError;
use atropos_types::{EventId, ValidatorId};
use thiserror::Error;

/// Errors from the vector-clock engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VecClockError {
    /// `reset` hasn't been called yet.
    #[error("vector engine used before reset")]
    NotReset,

    #[error("event creator {0} is not a validator of the current epoch")]
    UnknownCreator(ValidatorId),

    /// A parent has no vectors: events were presented out of order.
    #[error("processed out of order: parent {parent} of {event} not indexed")]
    ParentNotFound { event: EventId, parent: EventId },

    #[error("event {0} is not indexed")]
    NotIndexed(EventId),

    /// Ancestor walk reached an event the event source doesn't know.
    #[error("event {0} not found in event source")]
    EventNotFound(EventId),

    #[error("self-parent {self_parent} of {event} belongs to another creator's branch")]
    MisbehavingSelfParent { event: EventId, self_parent: EventId },

    #[error("inconsistent branches info: {0}")]
    InconsistentBranches(String),

    #[error("corrupted vector: {0}")]
    Corrupted(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl VecClockError {
    /// Whether the error means local state can no longer be trusted.
    ///
    /// Non-fatal errors reject only the offending event.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            VecClockError::UnknownCreator(_)
                | VecClockError::ParentNotFound { .. }
                | VecClockError::MisbehavingSelfParent { .. }
        )
    }
}
