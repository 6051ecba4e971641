//! Sincro test utilities.
//!
//! Helpers for integration testing: document builders, snapshot
//! fixtures, and a fault-injecting storage wrapper.

use anyhow::Result;
use async_trait::async_trait;
use serde_yml::{Mapping, Value};

use sincro_engine::{ConfigDocument, Serializer, Snapshot, Storage, YamlSerializer};

/// Create a test document builder with default values.
pub fn test_doc(name: &str) -> TestDoc {
    TestDoc {
        name: name.to_string(),
        collection: String::new(),
        config_deps: Vec::new(),
        fields: vec![("label".to_string(), Value::String(name.to_string()))],
    }
}

/// A document builder for creating test fixtures.
#[derive(Debug, Clone)]
pub struct TestDoc {
    pub name: String,
    pub collection: String,
    pub config_deps: Vec<String>,
    pub fields: Vec<(String, Value)>,
}

impl TestDoc {
    /// Place the document in a named collection.
    pub fn in_collection(mut self, collection: &str) -> Self {
        self.collection = collection.to_string();
        self
    }

    /// Declare a config dependency.
    pub fn depends_on(mut self, dep: &str) -> Self {
        self.config_deps.push(dep.to_string());
        self
    }

    /// Add a data field.
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.fields.push((key.to_string(), value));
        self
    }

    /// Build the immutable document.
    pub fn build(self) -> ConfigDocument {
        let mut data = Mapping::new();
        for (key, value) in self.fields {
            data.insert(Value::String(key), value);
        }

        if !self.config_deps.is_empty() {
            let mut sections = Mapping::new();
            sections.insert(
                Value::String("config".to_string()),
                Value::Sequence(self.config_deps.into_iter().map(Value::String).collect()),
            );
            data.insert(
                Value::String("dependencies".to_string()),
                Value::Mapping(sections),
            );
        }

        if self.collection.is_empty() {
            ConfigDocument::new(self.name, data)
        } else {
            ConfigDocument::in_collection(self.collection, self.name, data)
        }
    }
}

/// Build a snapshot from document builders.
pub fn snapshot_of(docs: impl IntoIterator<Item = TestDoc>) -> Snapshot {
    Snapshot::from_documents(docs.into_iter().map(TestDoc::build))
}

/// Write document builders into a store as YAML.
pub async fn seed(storage: &dyn Storage, docs: impl IntoIterator<Item = TestDoc>) -> Result<()> {
    let serializer = YamlSerializer;
    for doc in docs {
        let doc = doc.build();
        let bytes = serializer.encode(doc.data())?;
        storage.write(doc.collection(), doc.name(), &bytes).await?;
    }
    Ok(())
}

/// Storage wrapper that fails every write to one named document.
///
/// All other operations pass through to the wrapped store, which makes
/// fail-fast and partial-application behavior easy to provoke at a
/// chosen point of an ordered change list.
pub struct FailingStorage<S> {
    inner: S,
    fail_name: String,
}

impl<S> FailingStorage<S> {
    /// Wrap a store, failing writes (and deletes) of `fail_name`.
    pub fn new(inner: S, fail_name: &str) -> Self {
        Self {
            inner,
            fail_name: fail_name.to_string(),
        }
    }

    /// Unwrap the inner store.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Borrow the inner store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: Storage> Storage for FailingStorage<S> {
    async fn collections(&self) -> Result<Vec<String>> {
        self.inner.collections().await
    }

    async fn list(&self, collection: &str) -> Result<Vec<String>> {
        self.inner.list(collection).await
    }

    async fn read(&self, collection: &str, name: &str) -> Result<Option<Vec<u8>>> {
        self.inner.read(collection, name).await
    }

    async fn write(&self, collection: &str, name: &str, bytes: &[u8]) -> Result<()> {
        if name == self.fail_name {
            anyhow::bail!("injected write failure for '{name}'");
        }
        self.inner.write(collection, name, bytes).await
    }

    async fn delete(&self, collection: &str, name: &str) -> Result<bool> {
        if name == self.fail_name {
            anyhow::bail!("injected delete failure for '{name}'");
        }
        self.inner.delete(collection, name).await
    }
}
