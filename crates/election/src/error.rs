//! Election errors. All of them are fatal for the node.

use atropos_types::{EventId, Frame, ValidatorId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ElectionError {
    /// A voter's previous-frame roots haven't all been processed.
    #[error("roots processed out of order at root {root}: {reason}")]
    RootsOutOfOrder { root: EventId, reason: &'static str },

    /// Votes that are only possible if more than 1/3 of the weight is
    /// Byzantine.
    #[error("more than 1/3W is Byzantine (election frame {frame}, validator {validator:?}): {reason}")]
    ByzantineQuorum {
        frame: Frame,
        validator: Option<ValidatorId>,
        reason: &'static str,
    },

    #[error("failed to check whether {a} forklessly causes {b}: {reason}")]
    ForklessCause { a: EventId, b: EventId, reason: String },

    #[error("failed to read roots of frame {frame}: {reason}")]
    FrameRoots { frame: Frame, reason: String },
}
