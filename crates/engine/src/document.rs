//! Configuration documents: named, collection-scoped, ordered data.
//!
//! A [`ConfigDocument`] is immutable once loaded from a snapshot — updates
//! replace the whole document rather than mutating it in place. Document
//! data is an ordered mapping (`serde_yml::Mapping` preserves insertion
//! order) so that export and re-import are byte-stable.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_yml::{Mapping, Value};

/// Name of the default (unscoped) collection.
pub const DEFAULT_COLLECTION: &str = "";

/// Dependency keys consulted under `data.dependencies`.
const DEPENDENCY_KEYS: &[&str] = &["config", "module", "theme"];

/// A single named configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    name: String,
    #[serde(default)]
    collection: String,
    data: Mapping,
}

impl ConfigDocument {
    /// Create a document in the default collection.
    pub fn new(name: impl Into<String>, data: Mapping) -> Self {
        Self {
            name: name.into(),
            collection: DEFAULT_COLLECTION.to_string(),
            data,
        }
    }

    /// Create a document in a named collection.
    pub fn in_collection(
        collection: impl Into<String>,
        name: impl Into<String>,
        data: Mapping,
    ) -> Self {
        Self {
            name: name.into(),
            collection: collection.into(),
            data,
        }
    }

    /// Unique name of this document within its collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collection (namespace) this document belongs to.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The document's ordered key→value data.
    pub fn data(&self) -> &Mapping {
        &self.data
    }

    /// Names this document declares a dependency on.
    ///
    /// Collected from the `config`, `module`, and `theme` lists under the
    /// `dependencies` key. Entries that are not strings, and dependency
    /// sections that are not lists, are ignored.
    pub fn dependencies(&self) -> BTreeSet<String> {
        let mut deps = BTreeSet::new();

        let Some(Value::Mapping(sections)) = self.data.get("dependencies") else {
            return deps;
        };

        for key in DEPENDENCY_KEYS {
            if let Some(Value::Sequence(names)) = sections.get(*key) {
                for value in names {
                    if let Value::String(name) = value {
                        deps.insert(name.clone());
                    }
                }
            }
        }

        deps
    }
}

impl fmt::Display for ConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.collection.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.collection, self.name)
        }
    }
}
