//! Configuration for the consensus store and driver.

use atropos_vecclock::VectorCacheConfig;

/// Consensus store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// How many frames of roots to keep cached.
    pub roots_cache_frames: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            roots_cache_frames: 100,
        }
    }
}

impl StoreConfig {
    pub fn with_roots_cache_frames(mut self, frames: u64) -> Self {
        self.roots_cache_frames = frames;
        self
    }
}

/// Configuration for [`crate::IndexedLachesis::open`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbftConfig {
    pub store: StoreConfig,
    pub vector_cache: VectorCacheConfig,
}

impl AbftConfig {
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    pub fn with_vector_cache(mut self, vector_cache: VectorCacheConfig) -> Self {
        self.vector_cache = vector_cache;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_pattern() {
        let config = AbftConfig::default()
            .with_store(StoreConfig::default().with_roots_cache_frames(7))
            .with_vector_cache(VectorCacheConfig::disabled());

        assert_eq!(config.store.roots_cache_frames, 7);
        assert_eq!(config.vector_cache.forkless_cause, 0);
    }
}
