//! Sincro configuration synchronization engine.
//!
//! Compares an active configuration store against a staged "sync" store,
//! computes the create/update/delete change set, orders it so that
//! dependencies are satisfied, and applies it fail-fast. The storage and
//! serialization backends are pluggable collaborator traits.
//!
//! The main entry point for the command-line tool is the `sincro` binary.

pub mod config;
pub mod diff;
pub mod document;
pub mod error;
pub mod import;
pub mod serializer;
pub mod snapshot;
pub mod sort;
pub mod storage;
pub mod sync;

pub use diff::{Change, ChangeOp, ChangeSet, diff};
pub use document::{ConfigDocument, DEFAULT_COLLECTION};
pub use error::{ConfigError, ConfigResult};
pub use import::{ImportFailure, ImportResult, Importer};
pub use serializer::{Serializer, YamlSerializer};
pub use snapshot::Snapshot;
pub use sort::order;
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use sync::{ExportResult, ImportReport, RunState, Synchronizer, export};
