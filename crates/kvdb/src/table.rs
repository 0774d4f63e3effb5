//! Key-prefixed view over another store.

use crate::{KvPairs, KvStore, StoreError};
use std::sync::Arc;

/// A store whose keys are transparently prefixed.
///
/// Several tables can share one backing store as long as their prefixes
/// don't overlap.
#[derive(Clone)]
pub struct Table {
    prefix: Vec<u8>,
    inner: Arc<dyn KvStore>,
}

impl Table {
    pub fn new(inner: Arc<dyn KvStore>, prefix: &[u8]) -> Self {
        Self {
            prefix: prefix.to_vec(),
            inner,
        }
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.prefix.len() + key.len());
        full.extend_from_slice(&self.prefix);
        full.extend_from_slice(key);
        full
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("prefix", &String::from_utf8_lossy(&self.prefix))
            .finish()
    }
}

impl KvStore for Table {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.get(&self.full_key(key))
    }

    fn has(&self, key: &[u8]) -> Result<bool, StoreError> {
        self.inner.has(&self.full_key(key))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.inner.put(&self.full_key(key), value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.inner.delete(&self.full_key(key))
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<KvPairs, StoreError> {
        let strip = self.prefix.len();
        Ok(self
            .inner
            .iter_prefix(&self.full_key(prefix))?
            .into_iter()
            .map(|(k, v)| (k[strip..].to_vec(), v))
            .collect())
    }
}
