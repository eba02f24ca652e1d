//! In-memory record store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;

use super::{RecordStore, Row, StoreError, WriteBatch, expectations_hold, upsert_rows};

/// Record store kept entirely in memory.
///
/// Used by tests and short-lived tools. [`MemoryStore::set_unavailable`]
/// makes every call fail and [`MemoryStore::fail_writes_to`] rejects
/// batches touching one collection, to exercise storage-failure paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Row>>>,
    unavailable: AtomicBool,
    read_only: Mutex<HashSet<String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggles simulated unavailability.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Rejects every batch that writes to `collection` until cleared.
    pub fn fail_writes_to(&self, collection: &str) {
        self.read_only.lock().insert(collection.to_string());
    }

    /// Accepts writes to every collection again.
    pub fn clear_write_failures(&self) {
        self.read_only.lock().clear();
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    fn load_all(&self, collection: &str) -> Result<Vec<Row>, StoreError> {
        self.check()?;
        Ok(self.collections.lock().get(collection).cloned().unwrap_or_default())
    }

    fn fetch(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        self.check()?;
        let collections = self.collections.lock();
        Ok(collections
            .get(collection)
            .and_then(|rows| rows.iter().find(|(k, _)| k == key))
            .map(|(_, value)| value.clone()))
    }

    fn commit(&self, batch: WriteBatch) -> Result<bool, StoreError> {
        self.check()?;
        let mut collections = self.collections.lock();
        let holds = expectations_hold(batch.expectations(), |collection, key| {
            Ok(collections
                .get(collection)
                .and_then(|rows| rows.iter().find(|(k, _)| k == key))
                .map(|(_, value)| value.clone()))
        })?;
        if !holds {
            return Ok(false);
        }

        let writes = batch.into_writes();
        let blocked = {
            let read_only = self.read_only.lock();
            writes.iter().map(|(c, _)| c).find(|c| read_only.contains(*c)).cloned()
        };
        if let Some(collection) = blocked {
            return Err(StoreError::Unavailable(format!("writes to {collection} are failing")));
        }
        for (collection, rows) in writes {
            upsert_rows(collections.entry(collection).or_default(), rows);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_collection_loads_empty() {
        let store = MemoryStore::new();
        assert!(store.load_all("solutions").unwrap().is_empty());
        assert!(store.fetch("solutions", "x").unwrap().is_none());
    }

    #[test]
    fn collections_are_independent() {
        let store = MemoryStore::new();
        store.put_all("a", vec![("k".into(), json!(1))]).unwrap();
        store.put_all("b", vec![("k".into(), json!(2))]).unwrap();

        assert_eq!(store.fetch("a", "k").unwrap(), Some(json!(1)));
        assert_eq!(store.fetch("b", "k").unwrap(), Some(json!(2)));
    }

    #[test]
    fn failing_collection_rejects_the_whole_batch() {
        let store = MemoryStore::new();
        store.fail_writes_to("b");

        let batch = WriteBatch::new()
            .put_row("a", ("k".into(), json!(1)))
            .put_row("b", ("k".into(), json!(2)));
        assert!(matches!(store.commit(batch), Err(StoreError::Unavailable(_))));
        assert!(store.fetch("a", "k").unwrap().is_none());

        store.clear_write_failures();
        assert!(store.put_all("b", vec![("k".into(), json!(2))]).is_ok());
    }

    #[test]
    fn unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(store.load_all("a"), Err(StoreError::Unavailable(_))));
        assert!(store.put_all("a", vec![]).is_err());

        store.set_unavailable(false);
        assert!(store.load_all("a").is_ok());
    }
}
