//! Error types for Relvec operations.
//!
//! This module provides the common `Error` type and `Result<T>` alias used
//! across all Relvec crates. Uses `thiserror` for derive macros.

use thiserror::Error;

/// Errors that can occur in Relvec operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration: bad filter shapes, unsupported distance
    /// strategies, malformed rerank parameters. Never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The physical embedding column disagrees with the requested
    /// table descriptor. Carries both definitions for diagnostics.
    #[error(
        "The existing embedding column ({existing}) does not match the expected definition ({expected})"
    )]
    ColumnMismatch {
        /// Definition of the column as stored in the database.
        existing: String,
        /// Definition the caller asked for.
        expected: String,
    },

    /// Vector literal encode/decode failure: malformed text or a
    /// dimension mismatch on encode.
    #[error("Vector codec error: {0}")]
    Codec(String),

    /// A failure reported by the underlying database driver.
    #[error("Database error: {0}")]
    Database(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a column mismatch error from both column definitions.
    pub fn column_mismatch(existing: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::ColumnMismatch {
            existing: existing.into(),
            expected: expected.into(),
        }
    }

    /// Create a codec error.
    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }
}

/// Result type alias using Relvec's Error type.
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = Error::config("bad filter");
        assert_eq!(err.to_string(), "Configuration error: bad filter");
    }

    #[test]
    fn test_column_mismatch_carries_both_definitions() {
        let err = Error::column_mismatch("vecf64(4)", "vecf64(3)");
        let msg = err.to_string();
        assert!(msg.contains("vecf64(4)"));
        assert!(msg.contains("vecf64(3)"));
    }

    #[test]
    fn test_codec_error_display() {
        let err = Error::codec("unparseable literal");
        assert!(err.to_string().contains("unparseable literal"));
    }
}
