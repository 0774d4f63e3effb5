//! Vector clocks over the event DAG.
//!
//! For every event the engine stores two vectors indexed by branch:
//!
//! - **HighestBefore**: the highest sequence number of each branch observed
//!   by the event (plus the lowest, to detect overlapping forks)
//! - **LowestAfter**: the lowest sequence number of each branch whose event
//!   observes this one
//!
//! Comparing A's HighestBefore with B's LowestAfter answers "does A
//! forklessly cause B" without walking the DAG.
//!
//! # Branches
//!
//! Each validator starts with one branch. When a validator forks, the
//! engine opens a new branch for the fork lane. Once an event observes two
//! overlapping branches of the same validator, that validator is marked as a
//! cheater in the event's HighestBefore, and stays marked in every
//! descendant.
//!
//! # Encodings
//!
//! The engine is generic over a [`VectorScheme`]. [`SeqScheme`] keeps only
//! sequence numbers; [`TimedScheme`] also tracks creation times so it can
//! compute the weighted median time of an event.

mod branches;
mod cache;
mod engine;
mod error;
mod indexer;
mod median;
mod vector;

pub use branches::BranchesInfo;
pub use cache::{VectorCache, VectorCacheConfig};
pub use engine::VectorEngine;
pub use error::VecClockError;
pub use indexer::DagIndexer;
pub use vector::{
    BranchSeq, HighestBeforeSeq, HighestBeforeTime, HighestBeforeTimed, HighestBeforeVector,
    LowestAfterSeq, LowestAfterVector, SeqScheme, TimedScheme, VectorScheme,
    FORK_DETECTED_MIN_SEQ,
};
