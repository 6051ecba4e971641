//! Full synchronization runs: load → diff → sort → apply.
//!
//! A run moves through the states `Loaded → Diffed → Sorted → Applying →
//! {Completed | Failed}` with no skipped transitions. Everything happens
//! on one logical thread of control — ordering correctness depends on
//! strictly sequential application, so concurrent runs against the same
//! active store must be serialized by the caller (e.g. with an external
//! advisory lock). `Failed` is terminal for the computed change set; the
//! caller recovers by recomputing, and re-running a converged pair is a
//! no-op.

use std::fmt;

use tracing::{info, warn};

use crate::diff::{Change, ChangeSet, diff};
use crate::error::{ConfigError, ConfigResult};
use crate::import::{ImportResult, Importer};
use crate::serializer::Serializer;
use crate::snapshot::Snapshot;
use crate::sort::order;
use crate::storage::Storage;

/// Phase of an import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Loaded,
    Diffed,
    Sorted,
    Applying,
    Completed,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Loaded => write!(f, "loaded"),
            RunState::Diffed => write!(f, "diffed"),
            RunState::Sorted => write!(f, "sorted"),
            RunState::Applying => write!(f, "applying"),
            RunState::Completed => write!(f, "completed"),
            RunState::Failed => write!(f, "failed"),
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct ImportReport {
    pub change_set: ChangeSet,
    pub result: ImportResult,
}

impl ImportReport {
    /// Terminal state of the run.
    pub fn state(&self) -> RunState {
        if self.result.is_complete() {
            RunState::Completed
        } else {
            RunState::Failed
        }
    }
}

/// Orchestrates one import run between a sync store and an active store.
pub struct Synchronizer<'a> {
    active: &'a dyn Storage,
    sync: &'a dyn Storage,
    serializer: &'a dyn Serializer,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        active: &'a dyn Storage,
        sync: &'a dyn Storage,
        serializer: &'a dyn Serializer,
    ) -> Self {
        Self {
            active,
            sync,
            serializer,
        }
    }

    /// Run the read-only phases: load both stores, diff, sort.
    async fn prepare(&self) -> ConfigResult<(Snapshot, Snapshot, ChangeSet, Vec<Change>)> {
        let active = Snapshot::load(self.active, self.serializer).await?;
        let sync = Snapshot::load(self.sync, self.serializer).await?;
        info!(state = %RunState::Loaded, active = active.len(), sync = sync.len(), "Snapshots read");

        let changes = diff(&active, &sync);
        info!(state = %RunState::Diffed, operations = changes.len(), "Change set computed");

        let ordered = order(&changes, &active, &sync)?;
        info!(state = %RunState::Sorted, "Apply order resolved");

        Ok((active, sync, changes, ordered))
    }

    /// Load, diff, and sort without mutating anything.
    ///
    /// This is the dry-run surface: the returned plan is exactly what
    /// [`run`](Self::run) would apply, including cycle detection.
    pub async fn preview(&self) -> ConfigResult<(ChangeSet, Vec<Change>)> {
        let (_, _, changes, ordered) = self.prepare().await?;
        Ok((changes, ordered))
    }

    /// Execute a full import run.
    ///
    /// Errors before `Applying` (unreadable storage, malformed documents,
    /// dependency cycles) abort with no mutation. Once applying begins,
    /// the run proceeds to completion or first failure — there is no
    /// cancellation mid-apply — and the partial outcome is reported in
    /// the [`ImportReport`].
    pub async fn run(&self) -> ConfigResult<ImportReport> {
        let (active, sync, changes, ordered) = self.prepare().await?;

        info!(state = %RunState::Applying, operations = ordered.len(), "Applying change set");
        let importer = Importer::new(self.active, self.serializer);
        let result = importer.apply(ordered, &active, &sync).await;

        let report = ImportReport {
            change_set: changes,
            result,
        };
        match report.state() {
            RunState::Completed => {
                info!(state = %RunState::Completed, applied = report.result.applied.len(), "Import complete");
            }
            state => {
                warn!(
                    state = %state,
                    applied = report.result.applied.len(),
                    unattempted = report.result.unattempted.len(),
                    "Import stopped at first failure"
                );
            }
        }
        Ok(report)
    }
}

/// Summary of an export pass.
#[derive(Debug, Default)]
pub struct ExportResult {
    /// Documents written to the target store.
    pub written: usize,
    /// Stale documents removed from the target store (with `clean`).
    pub removed: usize,
}

/// Write every document of `source` into `target`.
///
/// With `clean`, documents present in the target but not in the source
/// are removed *after* all writes succeed, so a failing export never
/// deletes anything.
pub async fn export(
    source: &dyn Storage,
    target: &dyn Storage,
    serializer: &dyn Serializer,
    clean: bool,
) -> ConfigResult<ExportResult> {
    let snapshot = Snapshot::load(source, serializer).await?;
    let mut result = ExportResult::default();

    for doc in snapshot.documents() {
        let bytes = serializer
            .encode(doc.data())
            .map_err(|e| ConfigError::write(doc.collection(), doc.name(), e))?;
        target
            .write(doc.collection(), doc.name(), &bytes)
            .await
            .map_err(|e| ConfigError::write(doc.collection(), doc.name(), e))?;
        result.written += 1;
    }

    if clean {
        // Stale detection goes straight to the store — a stale document
        // that no longer parses must still be removable.
        let mut collections = vec![crate::document::DEFAULT_COLLECTION.to_string()];
        collections.extend(target.collections().await.map_err(ConfigError::unreadable)?);

        for collection in &collections {
            let names = target.list(collection).await.map_err(ConfigError::unreadable)?;
            for name in names {
                if snapshot.get(collection, &name).is_none() {
                    let removed = target
                        .delete(collection, &name)
                        .await
                        .map_err(|e| ConfigError::write(collection, &name, e))?;
                    if removed {
                        result.removed += 1;
                    }
                }
            }
        }
    }

    info!(
        written = result.written,
        removed = result.removed,
        "Export complete"
    );
    Ok(result)
}
