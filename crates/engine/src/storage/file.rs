//! File-backed storage: one YAML file per document.
//!
//! Layout: `{root}/{name}.yml` for the default collection, with each
//! named collection in its own subdirectory (`{root}/{collection}/`).
//!
//! Listing is hardened against hostile directories: symlinks, dotfiles,
//! files with unrecognized extensions, and files exceeding
//! [`MAX_DOCUMENT_FILE_SIZE`] are skipped with a warning rather than
//! imported.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

use super::{Storage, validate_name};
use crate::document::DEFAULT_COLLECTION;

/// Maximum document file size (10 MB). Larger files are rejected to
/// prevent unbounded memory allocation from malicious or accidental
/// large files.
pub const MAX_DOCUMENT_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// A directory of YAML document files.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Create a store rooted at the given directory.
    ///
    /// The directory does not need to exist yet; it is created on first
    /// write, and reads against a missing directory behave as an empty
    /// store.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        if collection == DEFAULT_COLLECTION {
            self.root.clone()
        } else {
            self.root.join(collection)
        }
    }

    fn document_path(&self, collection: &str, name: &str) -> PathBuf {
        self.collection_dir(collection).join(format!("{name}.yml"))
    }
}

/// Extract a document name from a filename, or `None` if the file
/// doesn't look like a stored document.
fn parse_document_filename(filename: &str) -> Option<&str> {
    if filename.starts_with('.') {
        return None;
    }
    let name = filename
        .strip_suffix(".yml")
        .or_else(|| filename.strip_suffix(".yaml"))?;
    if validate_name(name).is_err() {
        return None;
    }
    Some(name)
}

#[async_trait]
impl Storage for FileStorage {
    async fn collections(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to read directory {}", self.root.display())
                });
            }
        };

        let mut collections = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if !file_type.is_dir() || file_type.is_symlink() {
                continue;
            }
            match entry.file_name().to_str() {
                Some(name) if validate_name(name).is_ok() => {
                    collections.push(name.to_string());
                }
                Some(name) => {
                    warn!(collection = name, "Skipping directory with unsafe name");
                }
                None => {
                    warn!(path = %entry.path().display(), "Skipping non-UTF-8 directory name");
                }
            }
        }
        collections.sort();
        Ok(collections)
    }

    async fn list(&self, collection: &str) -> Result<Vec<String>> {
        let dir = self.collection_dir(collection);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read directory {}", dir.display()));
            }
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            let filename = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n,
                None => {
                    warn!(path = %path.display(), "Skipping file with non-UTF-8 name");
                    continue;
                }
            };

            let name = match parse_document_filename(filename) {
                Some(name) => name,
                None => continue,
            };

            // Skip symlinks to prevent reading files outside the store.
            let metadata = tokio::fs::symlink_metadata(&path)
                .await
                .with_context(|| format!("failed to read metadata for {filename}"))?;
            if metadata.file_type().is_symlink() {
                warn!(filename, "Skipping symlink");
                continue;
            }
            if metadata.len() > MAX_DOCUMENT_FILE_SIZE {
                warn!(
                    filename,
                    size = metadata.len(),
                    limit = MAX_DOCUMENT_FILE_SIZE,
                    "Skipping oversized file"
                );
                continue;
            }

            names.push(name.to_string());
        }
        names.sort();
        Ok(names)
    }

    async fn read(&self, collection: &str, name: &str) -> Result<Option<Vec<u8>>> {
        if validate_name(name).is_err() {
            return Ok(None);
        }
        let path = self.document_path(collection, name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    async fn write(&self, collection: &str, name: &str, bytes: &[u8]) -> Result<()> {
        validate_name(name).with_context(|| format!("unsafe document name '{name}'"))?;
        if collection != DEFAULT_COLLECTION {
            validate_name(collection)
                .with_context(|| format!("unsafe collection name '{collection}'"))?;
        }

        let dir = self.collection_dir(collection);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create directory {}", dir.display()))?;

        let path = self.document_path(collection, name);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))
    }

    async fn delete(&self, collection: &str, name: &str) -> Result<bool> {
        if validate_name(name).is_err() {
            return Ok(false);
        }
        let path = self.document_path(collection, name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
        }
    }
}
