//! Virtual-voting election.
//!
//! Decides the Atropos of a frame `F` by letting the roots of later frames
//! vote, without exchanging any messages:
//!
//! - Round 1 (roots of `F + 1`): vote yes for a validator iff the voter
//!   forklessly causes that validator's root at `F`.
//! - Round 2+ (roots of `F + k`): take the votes of the previous-frame roots
//!   the voter forklessly causes; vote with the weighted majority and decide
//!   once either side reaches quorum.
//!
//! Once every validator is decided, the Atropos is the observed root of the
//! first decided-yes validator in validator index order.

mod election;
mod error;
mod roots;

pub use election::{Election, ElectionContext, ElectionResult};
pub use error::ElectionError;
pub use roots::{RootAndSlot, Slot};
