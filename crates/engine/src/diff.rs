//! Change detection between two snapshots.
//!
//! Comparison is collection-scoped: a name appearing in two different
//! collections is two unrelated documents, never an update of one by the
//! other.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::snapshot::Snapshot;

/// The operation needed to move one document from active toward sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeOp::Create => write!(f, "create"),
            ChangeOp::Update => write!(f, "update"),
            ChangeOp::Delete => write!(f, "delete"),
        }
    }
}

/// One entry of the apply order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Change {
    pub collection: String,
    pub name: String,
    pub op: ChangeOp,
}

impl Change {
    pub fn new(collection: impl Into<String>, name: impl Into<String>, op: ChangeOp) -> Self {
        Self {
            collection: collection.into(),
            name: name.into(),
            op,
        }
    }

    /// Collection-qualified document name, as shown in logs and errors.
    pub fn qualified_name(&self) -> String {
        qualified(&self.collection, &self.name)
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.qualified_name())
    }
}

/// Format a (collection, name) pair for human-readable output.
pub(crate) fn qualified(collection: &str, name: &str) -> String {
    if collection.is_empty() {
        name.to_string()
    } else {
        format!("{collection}/{name}")
    }
}

/// The unordered create/update/delete sets computed by [`diff`].
///
/// The three sets are disjoint: a (collection, name) pair appears in at
/// most one of them. Ordering for apply is a separate step
/// ([`crate::sort::order`]).
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    creates: BTreeSet<(String, String)>,
    updates: BTreeSet<(String, String)>,
    deletes: BTreeSet<(String, String)>,
}

impl ChangeSet {
    /// Documents present only in sync.
    pub fn creates(&self) -> impl Iterator<Item = (&str, &str)> {
        self.creates.iter().map(|(c, n)| (c.as_str(), n.as_str()))
    }

    /// Documents present in both with differing data.
    pub fn updates(&self) -> impl Iterator<Item = (&str, &str)> {
        self.updates.iter().map(|(c, n)| (c.as_str(), n.as_str()))
    }

    /// Documents present only in active.
    pub fn deletes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.deletes.iter().map(|(c, n)| (c.as_str(), n.as_str()))
    }

    /// Whether this document is touched by any operation in the set.
    pub fn contains(&self, collection: &str, name: &str) -> bool {
        self.op_for(collection, name).is_some()
    }

    /// The operation this set holds for a document, if any.
    pub fn op_for(&self, collection: &str, name: &str) -> Option<ChangeOp> {
        let key = (collection.to_string(), name.to_string());
        if self.creates.contains(&key) {
            Some(ChangeOp::Create)
        } else if self.updates.contains(&key) {
            Some(ChangeOp::Update)
        } else if self.deletes.contains(&key) {
            Some(ChangeOp::Delete)
        } else {
            None
        }
    }

    /// Total number of operations.
    pub fn len(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len()
    }

    /// True when active already matches sync.
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    /// All operations as [`Change`] records, sorted by collection/name.
    pub fn changes(&self) -> Vec<Change> {
        let mut all: Vec<Change> = self
            .creates()
            .map(|(c, n)| Change::new(c, n, ChangeOp::Create))
            .chain(self.updates().map(|(c, n)| Change::new(c, n, ChangeOp::Update)))
            .chain(self.deletes().map(|(c, n)| Change::new(c, n, ChangeOp::Delete)))
            .collect();
        all.sort_by(|a, b| (&a.collection, &a.name).cmp(&(&b.collection, &b.name)));
        all
    }

    pub(crate) fn delete_keys(&self) -> &BTreeSet<(String, String)> {
        &self.deletes
    }

    pub(crate) fn create_update_keys(&self) -> BTreeSet<(String, String)> {
        self.creates.union(&self.updates).cloned().collect()
    }
}

/// Compute the unordered change set moving `active` toward `sync`.
///
/// Documents with identical data are no-ops and excluded. `diff(s, s)`
/// is empty for any snapshot `s`.
pub fn diff(active: &Snapshot, sync: &Snapshot) -> ChangeSet {
    let mut set = ChangeSet::default();

    let collections: BTreeSet<&str> = active
        .collection_names()
        .chain(sync.collection_names())
        .collect();

    for collection in collections {
        let names: BTreeSet<&str> = active
            .collection(collection)
            .map(|d| d.name())
            .chain(sync.collection(collection).map(|d| d.name()))
            .collect();

        for name in names {
            let key = (collection.to_string(), name.to_string());
            match (active.get(collection, name), sync.get(collection, name)) {
                (None, Some(_)) => {
                    set.creates.insert(key);
                }
                (Some(_), None) => {
                    set.deletes.insert(key);
                }
                (Some(current), Some(desired)) if current.data() != desired.data() => {
                    set.updates.insert(key);
                }
                _ => {} // identical or (unreachably) absent from both
            }
        }
    }

    debug!(
        creates = set.creates.len(),
        updates = set.updates.len(),
        deletes = set.deletes.len(),
        "Change set computed"
    );
    set
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::document::ConfigDocument;

    fn doc(name: &str, yaml: &str) -> ConfigDocument {
        ConfigDocument::new(name, serde_yml::from_str(yaml).unwrap())
    }

    fn scoped(collection: &str, name: &str, yaml: &str) -> ConfigDocument {
        ConfigDocument::in_collection(collection, name, serde_yml::from_str(yaml).unwrap())
    }

    #[test]
    fn identical_snapshots_yield_empty_set() {
        let snapshot = Snapshot::from_documents([doc("a", "x: 1\n"), doc("b", "y: 2\n")]);
        let set = diff(&snapshot, &snapshot);
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn classifies_create_update_delete() {
        let active = Snapshot::from_documents([doc("kept", "x: 1\n"), doc("gone", "y: 2\n")]);
        let sync = Snapshot::from_documents([doc("kept", "x: 2\n"), doc("fresh", "z: 3\n")]);

        let set = diff(&active, &sync);
        assert_eq!(set.op_for("", "fresh"), Some(ChangeOp::Create));
        assert_eq!(set.op_for("", "kept"), Some(ChangeOp::Update));
        assert_eq!(set.op_for("", "gone"), Some(ChangeOp::Delete));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn unchanged_documents_excluded() {
        let active = Snapshot::from_documents([doc("same", "x: 1\n"), doc("changed", "y: 1\n")]);
        let sync = Snapshot::from_documents([doc("same", "x: 1\n"), doc("changed", "y: 2\n")]);

        let set = diff(&active, &sync);
        assert!(!set.contains("", "same"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn cross_collection_names_are_distinct() {
        let active = Snapshot::from_documents([doc("site.settings", "x: 1\n")]);
        let sync = Snapshot::from_documents([scoped("language.fr", "site.settings", "x: 1\n")]);

        let set = diff(&active, &sync);
        assert_eq!(set.op_for("", "site.settings"), Some(ChangeOp::Delete));
        assert_eq!(
            set.op_for("language.fr", "site.settings"),
            Some(ChangeOp::Create)
        );
    }
}
