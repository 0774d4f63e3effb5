//! Identifier and counter types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-creator event sequence number (1 for the creator's first event in an epoch).
pub type Seq = u32;

/// Lamport timestamp of an event.
pub type Lamport = u32;

/// Validator weight.
pub type Weight = u64;

/// Creation time of an event, in nanoseconds. Advisory only.
pub type Timestamp = u64;

/// Index of a fork-detection branch. The first `validators.len()` branches
/// are the validators' original branches, so branch `i` belongs to the
/// validator with index `i` until forks are observed.
pub type BranchId = usize;

/// Validator identifier (stable across epochs).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ValidatorId(pub u32);

impl ValidatorId {
    /// Big-endian encoding.
    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validator({})", self.0)
    }
}

/// Epoch identifier (monotonically increasing).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Epoch(pub u32);

impl Epoch {
    /// The first epoch of a fresh network.
    pub const FIRST: Self = Epoch(1);

    /// Get the next epoch.
    pub fn next(self) -> Self {
        Epoch(self.0 + 1)
    }

    /// Get the previous epoch (returns None if at zero).
    pub fn prev(self) -> Option<Self> {
        self.0.checked_sub(1).map(Epoch)
    }

    /// Big-endian encoding.
    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Epoch({})", self.0)
    }
}

/// Frame number within an epoch.
///
/// Frame 0 is never assigned to an event; `Frame::ZERO` is used as "nothing
/// decided yet" and as the self-parent frame of an event without a self-parent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Frame(pub u32);

impl Frame {
    /// Sentinel for "no frame".
    pub const ZERO: Self = Frame(0);

    /// The first frame of every epoch.
    pub const FIRST: Self = Frame(1);

    /// Get the next frame.
    pub fn next(self) -> Self {
        Frame(self.0 + 1)
    }

    /// Get the previous frame, saturating at zero.
    pub fn prev(self) -> Self {
        Frame(self.0.saturating_sub(1))
    }

    /// Big-endian encoding, used as a sortable key prefix.
    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Decode from the big-endian encoding.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Frame(u32::from_be_bytes(bytes))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Length of an [`EventId`] in bytes.
pub const EVENT_ID_LEN: usize = 32;

/// Content-derived event identifier.
///
/// Layout: `epoch (4B BE) ‖ lamport (4B BE) ‖ hash tail (24B)`, so IDs sort
/// by epoch, then Lamport time.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct EventId(pub [u8; EVENT_ID_LEN]);

impl EventId {
    /// All-zero ID.
    pub const ZERO: Self = EventId([0u8; EVENT_ID_LEN]);

    /// Assemble an ID from its epoch, Lamport time and content hash.
    pub fn from_parts(epoch: Epoch, lamport: Lamport, hash: &[u8; 32]) -> Self {
        let mut bytes = [0u8; EVENT_ID_LEN];
        bytes[0..4].copy_from_slice(&epoch.to_bytes());
        bytes[4..8].copy_from_slice(&lamport.to_be_bytes());
        bytes[8..].copy_from_slice(&hash[8..]);
        EventId(bytes)
    }

    /// Decode from a byte slice. Returns None if the length is wrong.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; EVENT_ID_LEN] = bytes.try_into().ok()?;
        Some(EventId(array))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; EVENT_ID_LEN] {
        &self.0
    }

    /// Epoch encoded in the ID.
    pub fn epoch(&self) -> Epoch {
        Epoch(u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]]))
    }

    /// Lamport time encoded in the ID.
    pub fn lamport(&self) -> Lamport {
        u32::from_be_bytes([self.0[4], self.0[5], self.0[6], self.0[7]])
    }

    /// Full hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.epoch().0,
            self.lamport(),
            hex::encode(&self.0[8..12])
        )
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_layout() {
        let hash = [7u8; 32];
        let id = EventId::from_parts(Epoch(3), 42, &hash);
        assert_eq!(id.epoch(), Epoch(3));
        assert_eq!(id.lamport(), 42);
        assert_eq!(&id.0[8..], &hash[8..]);
    }

    #[test]
    fn test_event_ids_sort_by_lamport_within_epoch() {
        let low = EventId::from_parts(Epoch(1), 2, &[0xff; 32]);
        let high = EventId::from_parts(Epoch(1), 3, &[0x00; 32]);
        assert!(low < high);
    }

    #[test]
    fn test_frame_bytes_are_sortable() {
        assert!(Frame(1).to_bytes() < Frame(256).to_bytes());
        assert_eq!(Frame::from_bytes(Frame(513).to_bytes()), Frame(513));
    }

    #[test]
    fn test_epoch_navigation() {
        assert_eq!(Epoch::FIRST.next(), Epoch(2));
        assert_eq!(Epoch(0).prev(), None);
        assert_eq!(Frame::FIRST.prev(), Frame::ZERO);
    }
}
