//! In-memory record store

use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use super::{Collection, RecordStore};
use crate::error::{LendingError, LendingResult};

/// Record store held in process memory
///
/// Used for tests and embedding. Keeps simple read/write statistics.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Value>>>,

    /// Statistics
    loads: AtomicU64,
    saves: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `load` calls served
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    /// Number of `save` calls applied
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }

    /// Number of records currently held in a collection
    pub fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .map(|c| c.get(&collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: Collection) -> bool {
        self.len(collection) == 0
    }
}

impl RecordStore for MemoryStore {
    fn load(&self, collection: Collection) -> LendingResult<Vec<Value>> {
        let guard = self
            .collections
            .read()
            .map_err(|_| LendingError::Store("memory store lock poisoned".to_string()))?;
        self.loads.fetch_add(1, Ordering::Relaxed);
        Ok(guard.get(&collection).cloned().unwrap_or_default())
    }

    fn save(&self, collection: Collection, records: Vec<Value>) -> LendingResult<()> {
        let mut guard = self
            .collections
            .write()
            .map_err(|_| LendingError::Store("memory store lock poisoned".to_string()))?;
        guard.insert(collection, records);
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_collection_loads_empty() {
        let store = MemoryStore::new();
        assert!(store.load(Collection::Offers).unwrap().is_empty());
        assert_eq!(store.load_count(), 1);
    }

    #[test]
    fn test_save_replaces_collection() {
        let store = MemoryStore::new();

        store.save(Collection::Disputes, vec![json!({"id": "a"}), json!({"id": "b"})]).unwrap();
        store.save(Collection::Disputes, vec![json!({"id": "c"})]).unwrap();

        let loaded = store.load(Collection::Disputes).unwrap();
        assert_eq!(loaded, vec![json!({"id": "c"})]);
        assert_eq!(store.len(Collection::Disputes), 1);
        assert!(store.is_empty(Collection::Offers));
        assert_eq!(store.save_count(), 2);
    }
}
