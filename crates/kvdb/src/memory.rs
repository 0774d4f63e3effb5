//! In-memory store.

use crate::{next_prefix, KvPairs, KvStore, StoreError};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-memory ordered key-value store.
///
/// Clones share the same data. [`MemoryDb::snapshot`] makes an independent
/// copy, which is how tests emulate "restart from what was on disk".
#[derive(Debug, Clone)]
pub struct MemoryDb {
    name: Arc<str>,
    data: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
    closed: Arc<AtomicBool>,
}

impl MemoryDb {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            data: Arc::new(RwLock::new(BTreeMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of stored pairs.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Mark closed; every later operation fails with [`StoreError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Deep copy sharing nothing with `self`.
    pub fn snapshot(&self) -> Self {
        Self {
            name: self.name.clone(),
            data: Arc::new(RwLock::new(self.data.read().clone())),
            closed: Arc::new(AtomicBool::new(self.is_closed())),
        }
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed(self.name.to_string()));
        }
        Ok(())
    }
}

impl KvStore for MemoryDb {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.check_open()?;
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.check_open()?;
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.check_open()?;
        self.data.write().remove(key);
        Ok(())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<KvPairs, StoreError> {
        self.check_open()?;
        let data = self.data.read();
        let end = match next_prefix(prefix) {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        Ok(data
            .range((Bound::Included(prefix.to_vec()), end))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
