//! Named database lifecycle.

use crate::{KvStore, MemoryDb, StoreError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Opens and drops named databases.
///
/// The consensus store keeps one database per epoch and drops it when the
/// epoch is sealed.
pub trait DbProducer: Send + Sync {
    /// Open the named database, creating it if missing.
    fn open_db(&self, name: &str) -> Result<Arc<dyn KvStore>, StoreError>;

    /// Delete the named database. Handles opened before become unusable.
    fn drop_db(&self, name: &str) -> Result<(), StoreError>;
}

/// In-memory [`DbProducer`].
///
/// Clones share the same databases; [`MemDbProducer::snapshot`] deep-copies
/// them all, emulating a process restart over persisted data.
#[derive(Debug, Clone, Default)]
pub struct MemDbProducer {
    dbs: Arc<Mutex<BTreeMap<String, MemoryDb>>>,
}

impl MemDbProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the currently existing databases, sorted.
    pub fn names(&self) -> Vec<String> {
        self.dbs.lock().keys().cloned().collect()
    }

    pub fn snapshot(&self) -> Self {
        let copied = self
            .dbs
            .lock()
            .iter()
            .map(|(name, db)| (name.clone(), db.snapshot()))
            .collect();
        Self {
            dbs: Arc::new(Mutex::new(copied)),
        }
    }
}

impl DbProducer for MemDbProducer {
    fn open_db(&self, name: &str) -> Result<Arc<dyn KvStore>, StoreError> {
        let mut dbs = self.dbs.lock();
        let db = dbs
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(name, "Creating database");
                MemoryDb::new(name)
            })
            .clone();
        Ok(Arc::new(db))
    }

    fn drop_db(&self, name: &str) -> Result<(), StoreError> {
        if let Some(db) = self.dbs.lock().remove(name) {
            debug!(name, "Dropping database");
            db.close();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_shares_data() {
        let producer = MemDbProducer::new();
        producer.open_db("x").unwrap().put(b"k", b"v").unwrap();
        assert_eq!(
            producer.open_db("x").unwrap().get(b"k").unwrap(),
            Some(b"v".to_vec())
        );
        assert_eq!(producer.names(), vec!["x".to_string()]);
    }

    #[test]
    fn test_drop_closes_and_recreates_empty() {
        let producer = MemDbProducer::new();
        let old = producer.open_db("epoch-1").unwrap();
        old.put(b"k", b"v").unwrap();
        producer.drop_db("epoch-1").unwrap();

        assert!(matches!(old.get(b"k"), Err(StoreError::Closed(_))));
        let fresh = producer.open_db("epoch-1").unwrap();
        assert_eq!(fresh.get(b"k").unwrap(), None);
    }

    #[test]
    fn test_snapshot_survives_later_writes() {
        let producer = MemDbProducer::new();
        producer.open_db("main").unwrap().put(b"k", b"1").unwrap();
        let restarted = producer.snapshot();
        producer.open_db("main").unwrap().put(b"k", b"2").unwrap();
        assert_eq!(
            restarted.open_db("main").unwrap().get(b"k").unwrap(),
            Some(b"1".to_vec())
        );
    }
}
