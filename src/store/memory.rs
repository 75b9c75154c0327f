//! In-memory store, used by tests and ephemeral crawls

use anyhow::Result;
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::KvStore;

/// HashMap-backed store guarded by a read-write lock
pub struct MemoryTree<V> {
    entries: RwLock<HashMap<String, V>>,
}

impl<V> MemoryTree<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V> Default for MemoryTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> KvStore<V> for MemoryTree<V>
where
    V: Clone + Send + Sync,
{
    fn get(&self, key: &str) -> Result<Option<V>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &V) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.clone());
        Ok(())
    }

    fn insert_if_absent(&self, key: &str, value: &V) -> Result<bool> {
        match self.entries.write().entry(key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(value.clone());
                Ok(true)
            }
        }
    }

    fn entries(&self) -> Result<Vec<(String, V)>> {
        Ok(self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
