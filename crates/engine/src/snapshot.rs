//! Point-in-time views of a configuration store.
//!
//! A [`Snapshot`] is loaded fresh for every import run and has no
//! persistent identity — the engine compares two snapshots ("active" and
//! "sync") and never mutates one after loading. Loading is read-only.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::document::{ConfigDocument, DEFAULT_COLLECTION};
use crate::error::{ConfigError, ConfigResult};
use crate::serializer::Serializer;
use crate::storage::Storage;

/// All documents of a store, grouped by collection.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    collections: BTreeMap<String, BTreeMap<String, ConfigDocument>>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from pre-constructed documents.
    pub fn from_documents(documents: impl IntoIterator<Item = ConfigDocument>) -> Self {
        let mut snapshot = Self::empty();
        for doc in documents {
            snapshot
                .collections
                .entry(doc.collection().to_string())
                .or_default()
                .insert(doc.name().to_string(), doc);
        }
        snapshot
    }

    /// Read every document out of a store.
    ///
    /// Loads the default collection plus every collection the store
    /// reports. Fails with [`ConfigError::StorageUnreadable`] if the store
    /// cannot be listed or read, and [`ConfigError::Parse`] if a
    /// document's serialized form is malformed.
    pub async fn load(
        storage: &dyn Storage,
        serializer: &dyn Serializer,
    ) -> ConfigResult<Self> {
        let mut collections = vec![DEFAULT_COLLECTION.to_string()];
        collections.extend(
            storage
                .collections()
                .await
                .map_err(ConfigError::unreadable)?,
        );

        let mut snapshot = Self::empty();
        for collection in &collections {
            let names = storage
                .list(collection)
                .await
                .map_err(ConfigError::unreadable)?;

            for name in names {
                let bytes = match storage
                    .read(collection, &name)
                    .await
                    .map_err(ConfigError::unreadable)?
                {
                    Some(bytes) => bytes,
                    None => {
                        // Listed but gone by read time; treat as absent.
                        warn!(
                            collection = %collection,
                            name = %name,
                            "Document vanished between list and read"
                        );
                        continue;
                    }
                };

                let data = serializer
                    .decode(&bytes)
                    .map_err(|e| ConfigError::parse(collection, &name, e))?;

                snapshot
                    .collections
                    .entry(collection.clone())
                    .or_default()
                    .insert(
                        name.clone(),
                        ConfigDocument::in_collection(collection.clone(), name, data),
                    );
            }
        }

        debug!(
            documents = snapshot.len(),
            collections = snapshot.collections.len(),
            "Snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Look up a document by collection and name.
    pub fn get(&self, collection: &str, name: &str) -> Option<&ConfigDocument> {
        self.collections.get(collection)?.get(name)
    }

    /// Documents of one collection, sorted by name. Empty if absent.
    pub fn collection(&self, collection: &str) -> impl Iterator<Item = &ConfigDocument> {
        self.collections
            .get(collection)
            .into_iter()
            .flat_map(BTreeMap::values)
    }

    /// All collection names with at least one document, sorted.
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections
            .iter()
            .filter(|(_, docs)| !docs.is_empty())
            .map(|(name, _)| name.as_str())
    }

    /// All documents across all collections.
    pub fn documents(&self) -> impl Iterator<Item = &ConfigDocument> {
        self.collections.values().flat_map(BTreeMap::values)
    }

    /// Total number of documents.
    pub fn len(&self) -> usize {
        self.collections.values().map(BTreeMap::len).sum()
    }

    /// Whether the snapshot holds no documents.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::serializer::YamlSerializer;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn load_reads_all_collections() {
        let storage = MemoryStorage::new();
        storage.write("", "site.settings", b"name: Test\n").await.unwrap();
        storage
            .write("language.fr", "site.settings", b"name: Essai\n")
            .await
            .unwrap();

        let snapshot = Snapshot::load(&storage, &YamlSerializer).await.unwrap();
        assert_eq!(snapshot.len(), 2);

        let default = snapshot.get("", "site.settings").unwrap();
        let french = snapshot.get("language.fr", "site.settings").unwrap();
        assert_ne!(default.data(), french.data());
    }

    #[tokio::test]
    async fn malformed_document_is_a_parse_error() {
        let storage = MemoryStorage::new();
        storage
            .write("", "broken.doc", b"- not\n- a mapping\n")
            .await
            .unwrap();

        let err = Snapshot::load(&storage, &YamlSerializer).await.unwrap_err();
        match err {
            ConfigError::Parse { name, .. } => assert_eq!(name, "broken.doc"),
            other => panic!("expected Parse error, got: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_store_loads_empty_snapshot() {
        let storage = MemoryStorage::new();
        let snapshot = Snapshot::load(&storage, &YamlSerializer).await.unwrap();
        assert!(snapshot.is_empty());
    }
}
