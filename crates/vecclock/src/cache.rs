//! Caches owned by the vector engine.

use crate::VectorScheme;
use atropos_types::{BranchId, EventId};
use moka::sync::Cache;
use std::sync::Arc;

/// Cache capacities, in entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorCacheConfig {
    /// Forkless-cause results keyed by `(a, b)`.
    pub forkless_cause: u64,
    pub highest_before: u64,
    pub lowest_after: u64,
    pub event_branch: u64,
}

impl Default for VectorCacheConfig {
    fn default() -> Self {
        Self {
            forkless_cause: 20_000,
            highest_before: 2_000,
            lowest_after: 2_000,
            event_branch: 10_000,
        }
    }
}

impl VectorCacheConfig {
    pub fn with_forkless_cause(mut self, entries: u64) -> Self {
        self.forkless_cause = entries;
        self
    }

    pub fn with_highest_before(mut self, entries: u64) -> Self {
        self.highest_before = entries;
        self
    }

    pub fn with_lowest_after(mut self, entries: u64) -> Self {
        self.lowest_after = entries;
        self
    }

    pub fn with_event_branch(mut self, entries: u64) -> Self {
        self.event_branch = entries;
        self
    }

    /// Every capacity set to zero, so every lookup hits the store.
    pub fn disabled() -> Self {
        Self {
            forkless_cause: 0,
            highest_before: 0,
            lowest_after: 0,
            event_branch: 0,
        }
    }
}

/// Read-through caches in front of the vector table.
///
/// Entries are only ever derived from stored data, so dropping them is
/// always safe.
pub struct VectorCache<S: VectorScheme> {
    config: VectorCacheConfig,
    pub(crate) forkless_cause: Cache<(EventId, EventId), bool>,
    pub(crate) highest_before: Cache<EventId, Arc<S::HighestBefore>>,
    pub(crate) lowest_after: Cache<EventId, Arc<S::LowestAfter>>,
    pub(crate) event_branch: Cache<EventId, BranchId>,
}

impl<S: VectorScheme> VectorCache<S> {
    pub fn new(config: VectorCacheConfig) -> Self {
        Self {
            forkless_cause: Cache::new(config.forkless_cause),
            highest_before: Cache::new(config.highest_before),
            lowest_after: Cache::new(config.lowest_after),
            event_branch: Cache::new(config.event_branch),
            config,
        }
    }

    pub fn config(&self) -> &VectorCacheConfig {
        &self.config
    }

    /// Drop every entry.
    pub fn purge(&mut self) {
        *self = Self::new(self.config.clone());
    }

    /// Rebuild with new capacities. Entries are dropped.
    pub fn resize(&mut self, config: VectorCacheConfig) {
        *self = Self::new(config);
    }
}

impl<S: VectorScheme> std::fmt::Debug for VectorCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorCache")
            .field("config", &self.config)
            .finish()
    }
}
