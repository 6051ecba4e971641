//! Engine error types with clear, actionable messages.
//!
//! Every failure path in the import pipeline maps to one of these
//! variants; nothing is surfaced as a bare string or generic failure.

use thiserror::Error;

/// Errors that can occur while loading, ordering, or applying configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The backing store could not be listed or read.
    ///
    /// Raised before any mutation; fix the store and re-run.
    #[error("configuration storage unreadable: {details}")]
    StorageUnreadable { details: String },

    /// A document's serialized form is malformed.
    ///
    /// Raised before any mutation; fix the document and re-run.
    #[error("failed to parse '{name}' (collection '{collection}'): {details}")]
    Parse {
        collection: String,
        name: String,
        details: String,
    },

    /// The dependency graph over the change set has no topological order.
    ///
    /// Fatal before apply begins — the store is never partially mutated.
    #[error("circular dependency detected involving: {}", .members.join(", "))]
    CyclicDependency { members: Vec<String> },

    /// A delete target still has dependents outside the change set.
    ///
    /// Occurs during apply and leaves the store partially updated.
    #[error("cannot delete '{name}': still required by {}", .dependents.join(", "))]
    UnresolvedDependency {
        name: String,
        dependents: Vec<String>,
    },

    /// Writing or removing a document in the active store failed.
    ///
    /// Occurs during apply and leaves the store partially updated.
    #[error("failed to write '{name}' (collection '{collection}'): {details}")]
    WriteFailure {
        collection: String,
        name: String,
        details: String,
    },
}

impl ConfigError {
    /// Wrap a storage listing/read failure.
    pub fn unreadable(err: impl std::fmt::Display) -> Self {
        Self::StorageUnreadable {
            details: err.to_string(),
        }
    }

    /// Wrap a decode failure for a named document.
    pub fn parse(collection: &str, name: &str, err: impl std::fmt::Display) -> Self {
        Self::Parse {
            collection: collection.to_string(),
            name: name.to_string(),
            details: err.to_string(),
        }
    }

    /// Wrap a write/delete failure for a named document.
    pub fn write(collection: &str, name: &str, err: impl std::fmt::Display) -> Self {
        Self::WriteFailure {
            collection: collection.to_string(),
            name: name.to_string(),
            details: err.to_string(),
        }
    }
}

/// Result type alias using ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_names_members() {
        let err = ConfigError::CyclicDependency {
            members: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "circular dependency detected involving: a, b"
        );
    }

    #[test]
    fn unresolved_message_names_dependents() {
        let err = ConfigError::UnresolvedDependency {
            name: "field.body".to_string(),
            dependents: vec!["view.frontpage".to_string()],
        };
        assert!(err.to_string().contains("field.body"));
        assert!(err.to_string().contains("view.frontpage"));
    }
}
