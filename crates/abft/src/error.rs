//! Error types.

use atropos_election::ElectionError;
use atropos_kvdb::StoreError;
use atropos_types::{Epoch, EventError, EventId, Frame, ValidatorId};
use atropos_vecclock::VecClockError;
use thiserror::Error;

/// Errors from the consensus driver.
///
/// Rejections refuse a single event and leave the node running; fatal
/// errors go to the crit handler and halt the orderer. See
/// [`AbftError::is_fatal`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbftError {
    #[error("event {event}: claimed frame {claimed} mismatched with calculated {calculated}")]
    WrongFrame {
        event: EventId,
        claimed: Frame,
        calculated: Frame,
    },

    #[error("event {event}: claimed is_root={claimed} mismatched with calculated")]
    WrongIsRoot { event: EventId, claimed: bool },

    #[error("event {event}: parent created by {cheater}, a cheater observed by the self-parent")]
    CheatersObserved { event: EventId, cheater: ValidatorId },

    #[error("event {event} belongs to {got}, current is {expected}")]
    WrongEpoch {
        event: EventId,
        expected: Epoch,
        got: Epoch,
    },

    #[error("event creator {0} is not a validator of the current epoch")]
    UnknownCreator(ValidatorId),

    #[error("parent {parent} of {event} not found")]
    ParentNotFound { event: EventId, parent: EventId },

    #[error(transparent)]
    InvalidEvent(#[from] EventError),

    #[error("invalid genesis: {0}")]
    InvalidGenesis(&'static str),

    #[error("genesis already applied")]
    GenesisAlreadyApplied,

    #[error("consensus is not bootstrapped")]
    NotBootstrapped,

    #[error("consensus is already bootstrapped")]
    AlreadyBootstrapped,

    /// A fatal error happened earlier; the orderer no longer accepts work.
    #[error("consensus halted after a fatal error")]
    Halted,

    #[error("{0} is missing from the store")]
    MissingState(&'static str),

    #[error("event {0} not found while applying the Atropos")]
    EventNotFound(EventId),

    #[error("application returned an empty validator set")]
    EmptyValidators,

    #[error("corrupted record: {0}")]
    Corrupted(String),

    #[error(transparent)]
    Election(#[from] ElectionError),

    #[error(transparent)]
    VecClock(VecClockError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AbftError {
    /// Whether the error breaks consensus invariants or local storage.
    pub fn is_fatal(&self) -> bool {
        match self {
            AbftError::WrongFrame { .. }
            | AbftError::WrongIsRoot { .. }
            | AbftError::CheatersObserved { .. }
            | AbftError::WrongEpoch { .. }
            | AbftError::UnknownCreator(_)
            | AbftError::ParentNotFound { .. }
            | AbftError::InvalidEvent(_)
            | AbftError::InvalidGenesis(_)
            | AbftError::GenesisAlreadyApplied
            | AbftError::NotBootstrapped
            | AbftError::AlreadyBootstrapped
            | AbftError::Halted => false,
            AbftError::VecClock(err) => err.is_fatal(),
            AbftError::MissingState(_)
            | AbftError::EventNotFound(_)
            | AbftError::EmptyValidators
            | AbftError::Corrupted(_)
            | AbftError::Election(_)
            | AbftError::Store(_) => true,
        }
    }
}

impl From<VecClockError> for AbftError {
    fn from(err: VecClockError) -> Self {
        match err {
            VecClockError::UnknownCreator(creator) => AbftError::UnknownCreator(creator),
            VecClockError::ParentNotFound { event, parent } => {
                AbftError::ParentNotFound { event, parent }
            }
            other => AbftError::VecClock(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(!AbftError::UnknownCreator(ValidatorId(1)).is_fatal());
        assert_eq!(
            AbftError::from(VecClockError::ParentNotFound {
                event: EventId::ZERO,
                parent: EventId::ZERO,
            }),
            AbftError::ParentNotFound {
                event: EventId::ZERO,
                parent: EventId::ZERO,
            }
        );
        assert!(AbftError::from(VecClockError::EventNotFound(EventId::ZERO)).is_fatal());
        assert!(AbftError::from(ElectionError::RootsOutOfOrder {
            root: EventId::ZERO,
            reason: "test",
        })
        .is_fatal());
        assert!(!AbftError::Halted.is_fatal());
        assert!(!AbftError::from(VecClockError::MisbehavingSelfParent {
            event: EventId::ZERO,
            self_parent: EventId::ZERO,
        })
        .is_fatal());
        assert!(!AbftError::from(EventError::ForeignSelfParent {
            id: EventId::ZERO,
            self_parent: EventId::ZERO,
            creator: ValidatorId(2),
        })
        .is_fatal());
        assert!(AbftError::from(VecClockError::NotIndexed(EventId::ZERO)).is_fatal());
        assert!(AbftError::from(ElectionError::ForklessCause {
            a: EventId::ZERO,
            b: EventId::ZERO,
            reason: "test".into(),
        })
        .is_fatal());
    }
}
