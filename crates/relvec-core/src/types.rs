//! Shared result types for query operations.

use serde::{Deserialize, Serialize};

/// A single row returned by a similarity or full-text query.
///
/// For vector search `distance` is the raw distance from the query vector
/// (smaller is more similar). For full-text search it carries the
/// boolean-mode relevance score (larger is more relevant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Record identifier.
    pub id: String,

    /// Stored document text, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,

    /// Metadata snapshot from the record's JSON column.
    #[serde(default)]
    pub metadata: serde_json::Value,

    /// Distance (vector search) or relevance score (full-text search).
    pub distance: f64,
}

/// Outcome envelope for the raw-statement escape hatch.
///
/// The `execute` path never raises: any driver failure is folded into
/// `success: false` plus an error message, so scripted callers can inspect
/// failures without error handling of their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteOutcome {
    /// Whether the statement executed without error.
    pub success: bool,

    /// Fetched rows, one JSON object per row (SELECT statements only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<serde_json::Value>>,

    /// Affected row count (non-SELECT statements only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,

    /// Error message when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecuteOutcome {
    /// Successful SELECT outcome carrying fetched rows.
    pub fn rows(rows: Vec<serde_json::Value>) -> Self {
        Self {
            success: true,
            rows: Some(rows),
            rows_affected: None,
            error: None,
        }
    }

    /// Successful DML/DDL outcome carrying the affected row count.
    pub fn affected(count: u64) -> Self {
        Self {
            success: true,
            rows: None,
            rows_affected: Some(count),
            error: None,
        }
    }

    /// Failed outcome carrying the underlying error message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            rows: None,
            rows_affected: None,
            error: Some(message.into()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
