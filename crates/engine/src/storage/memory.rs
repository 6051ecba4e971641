//! In-memory storage backend.
//!
//! Used by tests and as a scratch staging target. Names are kept in
//! BTreeMaps so listings are deterministic without extra sorting.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;

use super::Storage;
use crate::document::DEFAULT_COLLECTION;

/// A thread-safe in-memory document store.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    collections: RwLock<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents across all collections.
    pub fn len(&self) -> usize {
        self.collections.read().values().map(BTreeMap::len).sum()
    }

    /// Whether the store holds no documents at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn collections(&self) -> Result<Vec<String>> {
        Ok(self
            .collections
            .read()
            .iter()
            .filter(|(name, docs)| *name != DEFAULT_COLLECTION && !docs.is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn list(&self, collection: &str) -> Result<Vec<String>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn read(&self, collection: &str, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(name).cloned()))
    }

    async fn write(&self, collection: &str, name: &str, bytes: &[u8]) -> Result<()> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, collection: &str, name: &str) -> Result<bool> {
        Ok(self
            .collections
            .write()
            .get_mut(collection)
            .is_some_and(|docs| docs.remove(name).is_some()))
    }
}
