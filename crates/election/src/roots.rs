//! Root descriptors.

use atropos_types::{EventId, Frame, ValidatorId};

/// Position of a root in the DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot {
    pub frame: Frame,
    pub validator: ValidatorId,
}

/// A root together with its slot.
///
/// More than one root per slot means the validator forked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootAndSlot {
    pub id: EventId,
    pub slot: Slot,
}

impl RootAndSlot {
    pub fn new(id: EventId, frame: Frame, validator: ValidatorId) -> Self {
        Self {
            id,
            slot: Slot { frame, validator },
        }
    }
}
