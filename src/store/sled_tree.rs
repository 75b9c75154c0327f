//! sled-backed store with bincode-encoded values

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use tracing::warn;

use super::KvStore;

/// A named sled tree holding values of type `V`
pub struct SledTree<V> {
    tree: sled::Tree,
    name: String,
    _marker: PhantomData<fn() -> V>,
}

impl<V> SledTree<V> {
    /// Open (or create) the tree `name` in `db`
    pub fn open(db: &sled::Db, name: &str) -> Result<Self> {
        let tree = db
            .open_tree(name)
            .with_context(|| format!("Failed to open {} tree", name))?;

        Ok(Self {
            tree,
            name: name.to_string(),
            _marker: PhantomData,
        })
    }
}

impl<V> SledTree<V>
where
    V: Serialize + DeserializeOwned,
{
    fn encode(&self, key: &str, value: &V) -> Result<Vec<u8>> {
        bincode::serialize(value)
            .with_context(|| format!("Failed to serialize {} entry {}", self.name, key))
    }

    fn decode(&self, key: &str, data: &[u8]) -> Result<V> {
        bincode::deserialize(data)
            .with_context(|| format!("Failed to deserialize {} entry {}", self.name, key))
    }
}

impl<V> KvStore<V> for SledTree<V>
where
    V: Serialize + DeserializeOwned,
{
    fn get(&self, key: &str) -> Result<Option<V>> {
        let data = self
            .tree
            .get(key.as_bytes())
            .with_context(|| format!("Failed to read {} entry {}", self.name, key))?;

        data.map(|bytes| self.decode(key, &bytes)).transpose()
    }

    fn put(&self, key: &str, value: &V) -> Result<()> {
        let data = self.encode(key, value)?;
        self.tree
            .insert(key.as_bytes(), data)
            .with_context(|| format!("Failed to store {} entry {}", self.name, key))?;
        Ok(())
    }

    fn insert_if_absent(&self, key: &str, value: &V) -> Result<bool> {
        let data = self.encode(key, value)?;
        let swapped = self
            .tree
            .compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(data))
            .with_context(|| format!("Failed to insert {} entry {}", self.name, key))?;
        Ok(swapped.is_ok())
    }

    fn entries(&self) -> Result<Vec<(String, V)>> {
        let mut entries = Vec::with_capacity(self.tree.len());
        for item in self.tree.iter() {
            let (key, data) =
                item.with_context(|| format!("Failed to iterate {} tree", self.name))?;
            let key = match String::from_utf8(key.to_vec()) {
                Ok(key) => key,
                Err(e) => {
                    warn!("Skipping {} entry with non-UTF-8 key: {}", self.name, e);
                    continue;
                }
            };
            let value = self.decode(&key, &data)?;
            entries.push((key, value));
        }
        Ok(entries)
    }

    fn len(&self) -> usize {
        self.tree.len()
    }

    fn flush(&self) -> Result<()> {
        self.tree
            .flush()
            .with_context(|| format!("Failed to flush {} tree", self.name))?;
        Ok(())
    }
}
