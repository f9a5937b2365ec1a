//! Distance strategies for vector similarity search.
//!
//! Each strategy maps to one database-side distance function and an
//! ordering direction. Every currently supported strategy orders ascending:
//! smaller distance means more similar.
//!
//! The enum is closed over what the engine actually supports today.
//! `cosine` and `inner_product` are recognized tags reserved for future
//! engine releases; resolving either is a configuration error rather than a
//! structurally-present-but-rejected variant.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use relvec_core::{Error, Result};

/// Similarity metric used to order vector search results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceStrategy {
    /// Euclidean (L2) distance. The default strategy: an unset strategy
    /// resolves to L2, which is also what the engine stores new indexes
    /// with.
    #[default]
    L2,
}

/// Tags accepted by [`DistanceStrategy::from_str`].
const VALID_TAGS: &str = "l2";

impl DistanceStrategy {
    /// The string tag for this strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L2 => "l2",
        }
    }

    /// The database-side distance function name.
    pub fn sql_function(&self) -> &'static str {
        match self {
            Self::L2 => "l2_distance",
        }
    }

    /// Operator class used when building the vector index.
    pub fn index_op_type(&self) -> &'static str {
        match self {
            Self::L2 => "vector_l2_ops",
        }
    }

    /// Resolve an optional strategy. Defaults to [`DistanceStrategy::L2`].
    pub fn resolve(strategy: Option<DistanceStrategy>) -> DistanceStrategy {
        strategy.unwrap_or_default()
    }
}

impl FromStr for DistanceStrategy {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "l2" => Ok(Self::L2),
            "cosine" | "inner_product" => Err(Error::config(format!(
                "distance strategy {tag:?} is not supported by this engine version; \
                 valid values: {VALID_TAGS}"
            ))),
            other => Err(Error::config(format!(
                "unknown distance strategy {other:?}; valid values: {VALID_TAGS}"
            ))),
        }
    }
}

impl fmt::Display for DistanceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_tag_and_function() {
        assert_eq!(DistanceStrategy::L2.as_str(), "l2");
        assert_eq!(DistanceStrategy::L2.sql_function(), "l2_distance");
    }

    #[test]
    fn test_resolve_defaults_to_l2() {
        assert_eq!(DistanceStrategy::resolve(None), DistanceStrategy::L2);
        assert_eq!(
            DistanceStrategy::resolve(Some(DistanceStrategy::L2)),
            DistanceStrategy::L2
        );
    }

    #[test]
    fn test_from_str_case_insensitive() {
        assert_eq!(
            "L2".parse::<DistanceStrategy>().unwrap(),
            DistanceStrategy::L2
        );
    }

    #[test]
    fn test_reserved_tags_rejected_naming_valid_set() {
        for tag in ["cosine", "inner_product"] {
            let err = tag.parse::<DistanceStrategy>().unwrap_err();
            assert!(matches!(err, Error::Config(_)));
            assert!(err.to_string().contains("l2"));
        }
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let err = "hamming".parse::<DistanceStrategy>().unwrap_err();
        assert!(err.to_string().contains("hamming"));
        assert!(err.to_string().contains("l2"));
    }

    #[test]
    fn test_serde_tag() {
        let json = serde_json::to_string(&DistanceStrategy::L2).unwrap();
        assert_eq!(json, "\"l2\"");
        let parsed: DistanceStrategy = serde_json::from_str("\"l2\"").unwrap();
        assert_eq!(parsed, DistanceStrategy::L2);
    }
}
