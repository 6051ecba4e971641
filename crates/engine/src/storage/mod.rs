//! Configuration storage abstraction layer.
//!
//! All document reads/writes go through the [`Storage`] trait. The engine
//! treats storage as a synchronous black box per call: timeouts and
//! retries belong to the implementation, not the engine. Implementations
//! must provide read-your-writes consistency within a single import run.
//!
//! # Collections
//!
//! Storage is partitioned into named collections (e.g. per-language
//! overrides). The default collection is the empty string and always
//! exists; [`Storage::collections`] reports only the additional named
//! collections present.

mod file;
mod memory;

use anyhow::Result;
use async_trait::async_trait;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Characters that are invalid in filenames on Windows/NTFS.
/// Rejected by [`validate_name`] for cross-platform portability.
const WINDOWS_INVALID_CHARS: &[char] = &[':', '*', '?', '"', '<', '>', '|'];

/// The collaborator trait for raw document storage.
///
/// Names are opaque unique keys within a collection; the bytes are opaque
/// to the store and interpreted only by the configured
/// [`Serializer`](crate::serializer::Serializer).
#[async_trait]
pub trait Storage: Send + Sync {
    /// Names of the non-default collections present in this store.
    async fn collections(&self) -> Result<Vec<String>>;

    /// List all document names in a collection.
    ///
    /// A collection with no documents yields an empty list, not an error.
    async fn list(&self, collection: &str) -> Result<Vec<String>>;

    /// Read a document's raw bytes. `None` if the document doesn't exist.
    async fn read(&self, collection: &str, name: &str) -> Result<Option<Vec<u8>>>;

    /// Write a document's raw bytes (insert or replace).
    async fn write(&self, collection: &str, name: &str, bytes: &[u8]) -> Result<()>;

    /// Delete a document. Returns `true` if it existed.
    async fn delete(&self, collection: &str, name: &str) -> Result<bool>;

    /// Check whether a document exists.
    async fn exists(&self, collection: &str, name: &str) -> Result<bool> {
        Ok(self.read(collection, name).await?.is_some())
    }
}

/// Validate that a document or collection name is safe for use in a path.
///
/// Rejects names containing path separators, parent-directory references,
/// null bytes, or characters invalid on Windows/NTFS — ensuring exported
/// files are portable and version-control friendly.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        anyhow::bail!("name is empty");
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        anyhow::bail!("name contains path separator or null byte: {name}");
    }
    if name.contains("..") {
        anyhow::bail!("name contains '..': {name}");
    }
    if let Some(c) = name.chars().find(|c| WINDOWS_INVALID_CHARS.contains(c)) {
        anyhow::bail!("name contains character '{c}' invalid on Windows: {name}");
    }
    if name.starts_with('.') || name.ends_with('.') {
        anyhow::bail!("name must not start or end with '.': {name}");
    }
    if name != name.trim() {
        anyhow::bail!("name has leading/trailing whitespace: {name}");
    }
    Ok(())
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn valid_names_accepted() {
        for name in ["site.settings", "item_type.article", "language.fr", "a"] {
            assert!(validate_name(name).is_ok(), "rejected valid name: {name}");
        }
    }

    #[test]
    fn unsafe_names_rejected() {
        for name in [
            "",
            "a/b",
            "a\\b",
            "a\0b",
            "../escape",
            "a..b",
            ".hidden",
            "trailing.",
            " padded ",
            "pipe|name",
            "colon:name",
        ] {
            assert!(validate_name(name).is_err(), "accepted unsafe name: {name}");
        }
    }
}
