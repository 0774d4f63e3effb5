//! DAG events.

use crate::{Epoch, EventId, Frame, Lamport, Seq, Timestamp, ValidatorId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Structural problems with an event's consensus fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("event {0} has duplicate parents")]
    DuplicateParents(EventId),

    #[error("event {id} has seq {seq}, but seq 1 is reserved for events without self-parent")]
    WrongSeq { id: EventId, seq: Seq },

    #[error("event {0} has zero seq")]
    ZeroSeq(EventId),

    #[error("self-parent {self_parent} of {id} was created by {creator}")]
    ForeignSelfParent {
        id: EventId,
        self_parent: EventId,
        creator: ValidatorId,
    },

    #[error("event {id} has lamport {got}, expected {expected}")]
    WrongLamport {
        id: EventId,
        got: Lamport,
        expected: Lamport,
    },
}

/// An immutable vertex of the DAG.
///
/// The first parent is the self-parent when `seq > 1`. Only the consensus
/// fields live here; payload validation belongs to the application.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    id: EventId,
    epoch: Epoch,
    seq: Seq,
    frame: Frame,
    is_root: bool,
    creator: ValidatorId,
    lamport: Lamport,
    parents: Vec<EventId>,
    creation_time: Timestamp,
    extra: Vec<u8>,
}

impl Event {
    /// Content-derived identifier.
    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn seq(&self) -> Seq {
        self.seq
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// Whether the creator claims this event is a root of its frame.
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn creator(&self) -> ValidatorId {
        self.creator
    }

    pub fn lamport(&self) -> Lamport {
        self.lamport
    }

    /// Ordered parents; the self-parent (if any) comes first.
    pub fn parents(&self) -> &[EventId] {
        &self.parents
    }

    pub fn creation_time(&self) -> Timestamp {
        self.creation_time
    }

    /// Opaque application data, covered by the ID.
    pub fn extra(&self) -> &[u8] {
        &self.extra
    }

    /// The creator's previous event, if any.
    pub fn self_parent(&self) -> Option<EventId> {
        if self.seq > 1 {
            self.parents.first().copied()
        } else {
            None
        }
    }

    /// Whether `id` is this event's self-parent.
    pub fn is_self_parent(&self, id: &EventId) -> bool {
        self.self_parent().as_ref() == Some(id)
    }

    /// Check the structural invariants that don't need the parents' contents.
    pub fn validate_structure(&self) -> Result<(), EventError> {
        if self.seq == 0 {
            return Err(EventError::ZeroSeq(self.id));
        }
        let unique: HashSet<_> = self.parents.iter().collect();
        if unique.len() != self.parents.len() {
            return Err(EventError::DuplicateParents(self.id));
        }
        if self.seq > 1 && self.parents.is_empty() {
            return Err(EventError::WrongSeq {
                id: self.id,
                seq: self.seq,
            });
        }
        Ok(())
    }

    /// Check `lamport == max(parent lamports) + 1`.
    pub fn validate_lamport(&self, parent_lamports: &[Lamport]) -> Result<(), EventError> {
        let expected = parent_lamports.iter().copied().max().unwrap_or(0) + 1;
        if self.lamport != expected {
            return Err(EventError::WrongLamport {
                id: self.id,
                got: self.lamport,
                expected,
            });
        }
        Ok(())
    }

    /// Convert back into a mutable draft.
    pub fn to_mutable(&self) -> MutableEvent {
        MutableEvent {
            epoch: self.epoch,
            seq: self.seq,
            frame: self.frame,
            is_root: self.is_root,
            creator: self.creator,
            lamport: self.lamport,
            parents: self.parents.clone(),
            creation_time: self.creation_time,
            extra: self.extra.clone(),
        }
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("creator", &self.creator.0)
            .field("seq", &self.seq)
            .field("frame", &self.frame.0)
            .field("is_root", &self.is_root)
            .field("lamport", &self.lamport)
            .field("parents", &self.parents.len())
            .finish()
    }
}

/// Event under construction.
///
/// Consensus fills in `frame` and `is_root` during build; `build()` then
/// freezes the event and derives its ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutableEvent {
    pub epoch: Epoch,
    pub seq: Seq,
    pub frame: Frame,
    pub is_root: bool,
    pub creator: ValidatorId,
    pub lamport: Lamport,
    pub parents: Vec<EventId>,
    pub creation_time: Timestamp,
    pub extra: Vec<u8>,
}

impl MutableEvent {
    pub fn set_frame(&mut self, frame: Frame) {
        self.frame = frame;
    }

    pub fn set_is_root(&mut self, is_root: bool) {
        self.is_root = is_root;
    }

    /// ID the event would get if built now.
    pub fn id(&self) -> EventId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"atropos.event.id");
        hasher.update(&self.epoch.to_bytes());
        hasher.update(&self.seq.to_be_bytes());
        hasher.update(&self.frame.to_bytes());
        hasher.update(&[self.is_root as u8]);
        hasher.update(&self.creator.to_bytes());
        hasher.update(&self.lamport.to_be_bytes());
        hasher.update(&(self.parents.len() as u32).to_be_bytes());
        for parent in &self.parents {
            hasher.update(parent.as_bytes());
        }
        hasher.update(&self.creation_time.to_be_bytes());
        hasher.update(&self.extra);
        EventId::from_parts(self.epoch, self.lamport, hasher.finalize().as_bytes())
    }

    /// Freeze into an immutable event.
    pub fn build(&self) -> Event {
        Event {
            id: self.id(),
            epoch: self.epoch,
            seq: self.seq,
            frame: self.frame,
            is_root: self.is_root,
            creator: self.creator,
            lamport: self.lamport,
            parents: self.parents.clone(),
            creation_time: self.creation_time,
            extra: self.extra.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(seq: Seq, parents: Vec<EventId>) -> MutableEvent {
        MutableEvent {
            epoch: Epoch(1),
            seq,
            creator: ValidatorId(1),
            lamport: 1,
            parents,
            ..Default::default()
        }
    }

    #[test]
    fn test_self_parent_requires_seq_above_one() {
        let parent = draft(1, vec![]).build();
        let first = draft(1, vec![parent.id()]).build();
        assert_eq!(first.self_parent(), None);

        let second = draft(2, vec![parent.id()]).build();
        assert_eq!(second.self_parent(), Some(parent.id()));
        assert!(second.is_self_parent(&parent.id()));
    }

    #[test]
    fn test_id_covers_frame() {
        let mut e = draft(1, vec![]);
        let before = e.id();
        e.set_frame(Frame(2));
        assert_ne!(before, e.id());
        assert_eq!(e.build().id(), e.id());
    }

    #[test]
    fn test_duplicate_parents_rejected() {
        let parent = draft(1, vec![]).build();
        let e = draft(2, vec![parent.id(), parent.id()]).build();
        assert_eq!(
            e.validate_structure(),
            Err(EventError::DuplicateParents(e.id()))
        );
    }

    #[test]
    fn test_lamport_validation() {
        let mut e = draft(1, vec![]);
        e.lamport = 4;
        let e = e.build();
        assert!(e.validate_lamport(&[3, 1]).is_ok());
        assert!(e.validate_lamport(&[4]).is_err());
    }

    #[test]
    fn test_round_trip_through_mutable() {
        let e = draft(1, vec![]).build();
        assert_eq!(e.to_mutable().build(), e);
    }
}
