//! Write overlay with explicit flush or discard.

use crate::{next_prefix, KvPairs, KvStore, StoreError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use tracing::trace;

/// Buffers writes in memory on top of a backing store.
///
/// Reads see buffered writes first. [`Flushable::flush`] applies the buffer
/// to the backing store; [`Flushable::drop_not_flushed`] discards it.
pub struct Flushable {
    parent: Arc<dyn KvStore>,
    /// `None` marks a buffered delete.
    modified: Mutex<BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
}

impl Flushable {
    pub fn new(parent: Arc<dyn KvStore>) -> Self {
        Self {
            parent,
            modified: Mutex::new(BTreeMap::new()),
        }
    }

    /// Number of buffered writes and deletes.
    pub fn not_flushed_pairs(&self) -> usize {
        self.modified.lock().len()
    }

    /// Apply every buffered write to the backing store, in key order.
    pub fn flush(&self) -> Result<(), StoreError> {
        let modified = std::mem::take(&mut *self.modified.lock());
        trace!(pairs = modified.len(), "Flushing overlay");
        for (key, value) in modified {
            match value {
                Some(value) => self.parent.put(&key, &value)?,
                None => self.parent.delete(&key)?,
            }
        }
        Ok(())
    }

    /// Discard every buffered write.
    pub fn drop_not_flushed(&self) {
        let mut modified = self.modified.lock();
        trace!(pairs = modified.len(), "Dropping overlay");
        modified.clear();
    }
}

impl KvStore for Flushable {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(value) = self.modified.lock().get(key) {
            return Ok(value.clone());
        }
        self.parent.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.modified
            .lock()
            .insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.modified.lock().insert(key.to_vec(), None);
        Ok(())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<KvPairs, StoreError> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.parent.iter_prefix(prefix)?.into_iter().collect();

        let modified = self.modified.lock();
        let end = match next_prefix(prefix) {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        for (key, value) in modified.range((Bound::Included(prefix.to_vec()), end)) {
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }
}

impl std::fmt::Debug for Flushable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flushable")
            .field("not_flushed", &self.not_flushed_pairs())
            .finish()
    }
}
