//! Applying an ordered change set to the active store.
//!
//! Each entry is an independent atomic step, applied strictly in order.
//! The first failure halts processing (fail-fast) — already-applied
//! items are NOT rolled back. Partial application is a documented
//! outcome; callers re-run the diff/import cycle to converge, which is
//! safe because an already-converged pair diffs to an empty change set.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::diff::{Change, ChangeOp};
use crate::error::{ConfigError, ConfigResult};
use crate::serializer::Serializer;
use crate::snapshot::Snapshot;
use crate::storage::Storage;

/// The change that stopped an import, and why.
#[derive(Debug)]
pub struct ImportFailure {
    pub change: Change,
    pub error: ConfigError,
}

/// Outcome of one apply pass.
///
/// `applied`, the optional failure, and `unattempted` partition the
/// ordered change list exactly: every entry lands in one of the three.
#[derive(Debug, Default)]
pub struct ImportResult {
    /// Changes applied before the run completed or failed.
    pub applied: Vec<Change>,
    /// The failing change, if the run did not complete.
    pub failure: Option<ImportFailure>,
    /// Changes after the failing one, never attempted.
    pub unattempted: Vec<Change>,
}

impl ImportResult {
    /// Whether every change was applied.
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Applies ordered changes to an active store.
///
/// The importer is the sole mutator of the active store during a run;
/// concurrent runs against the same store must be serialized by the
/// caller.
pub struct Importer<'a> {
    storage: &'a dyn Storage,
    serializer: &'a dyn Serializer,
}

impl<'a> Importer<'a> {
    pub fn new(storage: &'a dyn Storage, serializer: &'a dyn Serializer) -> Self {
        Self {
            storage,
            serializer,
        }
    }

    /// Apply an ordered change list, consuming it.
    ///
    /// Create/update data is taken from `sync`; delete validation reads
    /// `active`. Failures during apply are captured in the returned
    /// [`ImportResult`], not raised — the partial outcome is data the
    /// caller needs, not a transport error.
    pub async fn apply(
        &self,
        ordered: Vec<Change>,
        active: &Snapshot,
        sync: &Snapshot,
    ) -> ImportResult {
        // Documents touched anywhere in this run don't count as surviving
        // dependents when a delete is validated.
        let touched: BTreeSet<(String, String)> = ordered
            .iter()
            .map(|c| (c.collection.clone(), c.name.clone()))
            .collect();

        let mut result = ImportResult::default();
        let mut remaining = ordered.into_iter();

        while let Some(change) = remaining.next() {
            match self.apply_one(&change, &touched, active, sync).await {
                Ok(()) => {
                    debug!(change = %change, "Applied");
                    result.applied.push(change);
                }
                Err(error) => {
                    warn!(change = %change, error = %error, "Import halted");
                    result.failure = Some(ImportFailure { change, error });
                    result.unattempted = remaining.collect();
                    break;
                }
            }
        }

        info!(
            applied = result.applied.len(),
            unattempted = result.unattempted.len(),
            complete = result.is_complete(),
            "Apply pass finished"
        );
        result
    }

    async fn apply_one(
        &self,
        change: &Change,
        touched: &BTreeSet<(String, String)>,
        active: &Snapshot,
        sync: &Snapshot,
    ) -> ConfigResult<()> {
        match change.op {
            ChangeOp::Create | ChangeOp::Update => {
                let doc = sync.get(&change.collection, &change.name).ok_or_else(|| {
                    ConfigError::write(
                        &change.collection,
                        &change.name,
                        "document missing from sync snapshot",
                    )
                })?;

                let bytes = self
                    .serializer
                    .encode(doc.data())
                    .map_err(|e| ConfigError::write(&change.collection, &change.name, e))?;

                self.storage
                    .write(&change.collection, &change.name, &bytes)
                    .await
                    .map_err(|e| ConfigError::write(&change.collection, &change.name, e))
            }
            ChangeOp::Delete => {
                validate_delete(change, touched, active)?;

                // A target already gone is fine — the store has converged.
                self.storage
                    .delete(&change.collection, &change.name)
                    .await
                    .map(|_| ())
                    .map_err(|e| ConfigError::write(&change.collection, &change.name, e))
            }
        }
    }
}

/// A delete is only legal while no surviving document still depends on
/// the target. Dependents that are themselves part of this run (deleted
/// earlier, or rewritten by it) don't count.
fn validate_delete(
    change: &Change,
    touched: &BTreeSet<(String, String)>,
    active: &Snapshot,
) -> ConfigResult<()> {
    let dependents: Vec<String> = active
        .collection(&change.collection)
        .filter(|doc| doc.name() != change.name)
        .filter(|doc| doc.dependencies().contains(&change.name))
        .filter(|doc| !touched.contains(&(change.collection.clone(), doc.name().to_string())))
        .map(|doc| doc.name().to_string())
        .collect();

    if dependents.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::UnresolvedDependency {
            name: change.qualified_name(),
            dependents,
        })
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::document::ConfigDocument;
    use crate::serializer::YamlSerializer;
    use crate::storage::MemoryStorage;

    fn doc(name: &str, yaml: &str) -> ConfigDocument {
        ConfigDocument::new(name, serde_yml::from_str(yaml).unwrap())
    }

    #[tokio::test]
    async fn empty_change_list_is_a_completed_no_op() {
        let storage = MemoryStorage::new();
        let importer = Importer::new(&storage, &YamlSerializer);

        let result = importer
            .apply(Vec::new(), &Snapshot::empty(), &Snapshot::empty())
            .await;

        assert!(result.is_complete());
        assert!(result.applied.is_empty());
        assert!(result.unattempted.is_empty());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn creates_are_written_to_storage() {
        let storage = MemoryStorage::new();
        let importer = Importer::new(&storage, &YamlSerializer);
        let sync = Snapshot::from_documents([doc("site.settings", "name: Test\n")]);

        let result = importer
            .apply(
                vec![Change::new("", "site.settings", ChangeOp::Create)],
                &Snapshot::empty(),
                &sync,
            )
            .await;

        assert!(result.is_complete());
        assert_eq!(result.applied.len(), 1);
        assert!(storage.exists("", "site.settings").await.unwrap());
    }

    #[tokio::test]
    async fn delete_blocked_by_surviving_dependent() {
        let storage = MemoryStorage::new();
        storage.write("", "base", b"label: base\n").await.unwrap();
        storage
            .write(
                "",
                "dependent",
                b"label: dep\ndependencies:\n  config:\n    - base\n",
            )
            .await
            .unwrap();

        let active = Snapshot::load(&storage, &YamlSerializer).await.unwrap();
        let importer = Importer::new(&storage, &YamlSerializer);

        // Only "base" is in the run; "dependent" survives untouched.
        let result = importer
            .apply(
                vec![Change::new("", "base", ChangeOp::Delete)],
                &active,
                &Snapshot::empty(),
            )
            .await;

        assert!(!result.is_complete());
        let failure = result.failure.unwrap();
        assert!(matches!(
            failure.error,
            ConfigError::UnresolvedDependency { .. }
        ));
        // Nothing was removed.
        assert!(storage.exists("", "base").await.unwrap());
    }

    #[tokio::test]
    async fn delete_allowed_when_dependent_deleted_in_same_run() {
        let storage = MemoryStorage::new();
        storage.write("", "base", b"label: base\n").await.unwrap();
        storage
            .write(
                "",
                "dependent",
                b"label: dep\ndependencies:\n  config:\n    - base\n",
            )
            .await
            .unwrap();

        let active = Snapshot::load(&storage, &YamlSerializer).await.unwrap();
        let importer = Importer::new(&storage, &YamlSerializer);

        let result = importer
            .apply(
                vec![
                    Change::new("", "dependent", ChangeOp::Delete),
                    Change::new("", "base", ChangeOp::Delete),
                ],
                &active,
                &Snapshot::empty(),
            )
            .await;

        assert!(result.is_complete(), "failure: {:?}", result.failure);
        assert!(storage.is_empty());
    }
}
