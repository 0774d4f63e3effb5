//! # Key-value storage
//!
//! The consensus core only needs `get`/`put`/`delete`/iterate-by-prefix,
//! explicit flush/drop of buffered writes, and the ability to drop and
//! recreate a whole per-epoch database. This crate provides:
//!
//! - [`KvStore`]: the storage trait
//! - [`MemoryDb`]: in-memory implementation with deep-copy snapshots
//! - [`Table`]: a key-prefixed view of another store
//! - [`Flushable`]: a write overlay that is either flushed or dropped
//! - [`DbProducer`] / [`MemDbProducer`]: named databases, opened and dropped
//!   per epoch
//!
//! All operations are synchronous. Stores use interior mutability so handles
//! can be shared through `Arc<dyn KvStore>`.

mod flushable;
mod memory;
mod producer;
mod table;

pub use flushable::Flushable;
pub use memory::MemoryDb;
pub use producer::{DbProducer, MemDbProducer};
pub use table::Table;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The database was dropped or closed.
    #[error("database {0} is closed")]
    Closed(String),

    /// A stored record couldn't be decoded.
    #[error("corrupted record: {0}")]
    Corrupted(String),

    /// Backend failure.
    #[error("database error: {0}")]
    Backend(String),
}

/// Key-value pairs returned by prefix iteration, in ascending key order.
pub type KvPairs = Vec<(Vec<u8>, Vec<u8>)>;

/// Minimal key-value store.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    fn has(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;

    /// All pairs whose key starts with `prefix`, sorted by key.
    fn iter_prefix(&self, prefix: &[u8]) -> Result<KvPairs, StoreError>;
}

/// Smallest key greater than every key starting with `prefix`, or None if
/// the prefix is all `0xff`.
pub(crate) fn next_prefix(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_prefix() {
        assert_eq!(next_prefix(b"ab"), Some(b"ac".to_vec()));
        assert_eq!(next_prefix(&[0x01, 0xff]), Some(vec![0x02]));
        assert_eq!(next_prefix(&[0xff, 0xff]), None);
        assert_eq!(next_prefix(&[]), None);
    }
}
