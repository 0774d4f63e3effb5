//! Consensus state snapshots and decided blocks.

use crate::{Epoch, EventId, Frame, ValidatorId, Validators};
use serde::{Deserialize, Serialize};

/// Per-epoch state: which epoch is running and with which validators.
///
/// Replaced wholesale on every epoch seal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochState {
    pub epoch: Epoch,
    pub validators: Validators,
}

/// Progress of the election.
///
/// `last_decided_frame` is `Frame::ZERO` right after an epoch starts, while
/// `last_block_n` and `last_atropos` carry over from the previous epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LastDecidedState {
    pub last_decided_frame: Frame,
    /// Number of blocks decided since genesis.
    pub last_block_n: u64,
    /// Atropos of the last decided block, `EventId::ZERO` before the first.
    pub last_atropos: EventId,
}

/// Initial state applied to an empty store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Genesis {
    pub epoch: Epoch,
    pub validators: Validators,
}

/// A decided frame, handed to the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// The frame's Atropos.
    pub atropos: EventId,
    /// Validators observed forking by the Atropos, in validator index order.
    pub cheaters: Vec<ValidatorId>,
}
