//! Core types for the atropos aBFT consensus core.
//!
//! This crate provides the foundational types used throughout the consensus
//! implementation:
//!
//! - **Identifiers**: [`EventId`], [`ValidatorId`], [`Epoch`], [`Frame`]
//! - **DAG**: [`Event`], [`MutableEvent`], [`EventSource`]
//! - **Validators**: [`Validators`] and the quorum [`WeightCounter`]
//! - **State**: [`EpochState`], [`LastDecidedState`], [`Block`]
//!
//! # Design Philosophy
//!
//! This crate does not depend on any other workspace crate, making it the
//! foundation layer.

mod crit;
mod event;
mod identifiers;
mod source;
mod state;
mod validators;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crit::{log_crit, panic_crit, CritHandler};
pub use event::{Event, EventError, MutableEvent};
pub use identifiers::{
    BranchId, Epoch, EventId, Frame, Lamport, Seq, Timestamp, ValidatorId, Weight, EVENT_ID_LEN,
};
pub use source::{EventSource, EventStore};
pub use state::{Block, EpochState, Genesis, LastDecidedState};
pub use validators::{ValidatorsBuilder, Validators, WeightCounter};
