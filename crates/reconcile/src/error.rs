//! Error types for reconciliation passes.
//!
//! Fatal errors (`ConfigUnreadable`, `SecretUnavailable`) abort a pass before
//! any external call is made. `OperationFailed` is recovered per subject by the
//! applier. `WriteFailed` surfaces after external changes were attempted, which
//! are never rolled back.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during a reconciliation pass.
#[derive(Debug, Error)]
pub enum Error {
    /// Desired or locked document missing or malformed
    #[error("cannot read {}: {message}", path.display())]
    ConfigUnreadable {
        /// File that could not be loaded
        path: PathBuf,
        /// Underlying I/O or parse error
        message: String,
    },

    /// Required secret not configured, or the secret store call failed
    #[error("secret unavailable ({name}): {message}")]
    SecretUnavailable {
        /// Secret identifier that was requested
        name: String,
        /// Why the secret could not be resolved
        message: String,
    },

    /// A single subject's batch was rejected by the external system
    #[error("operation failed for {subject}: {message}")]
    OperationFailed {
        /// Subject whose batch failed
        subject: String,
        /// Error detail reported by the executor
        message: String,
    },

    /// Persisting the desired or locked document failed
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed {
        /// File that could not be written
        path: PathBuf,
        /// Underlying I/O or serialization error
        #[source]
        source: std::io::Error,
    },

    /// The pass was cancelled by the operator or a callback
    #[error("aborted: {0}")]
    Aborted(String),
}

impl Error {
    /// Build a `ConfigUnreadable` error from any displayable cause
    pub fn unreadable(path: impl Into<PathBuf>, cause: impl std::fmt::Display) -> Self {
        Self::ConfigUnreadable {
            path: path.into(),
            message: cause.to_string(),
        }
    }

    /// Build a `SecretUnavailable` error from any displayable cause
    pub fn secret(name: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::SecretUnavailable {
            name: name.into(),
            message: cause.to_string(),
        }
    }

    /// Build an `OperationFailed` error from any displayable cause
    pub fn operation(subject: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            subject: subject.into(),
            message: cause.to_string(),
        }
    }

    /// Whether this error aborts a pass before the external system is touched
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigUnreadable { .. } | Self::SecretUnavailable { .. }
        )
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::unreadable("a.json", "missing").is_fatal());
        assert!(Error::secret("db", "not set").is_fatal());
        assert!(!Error::operation("alice", "denied").is_fatal());
        assert!(!Error::Aborted("declined".into()).is_fatal());
    }

    #[test]
    fn test_messages_name_the_target() {
        let err = Error::unreadable("/etc/gk/sql-access.json", "expected value at line 1");
        assert_eq!(
            err.to_string(),
            "cannot read /etc/gk/sql-access.json: expected value at line 1"
        );

        let err = Error::operation("alice", "Access denied");
        assert_eq!(err.to_string(), "operation failed for alice: Access denied");
    }
}
