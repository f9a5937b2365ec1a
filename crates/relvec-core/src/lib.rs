//! Relvec Core — shared types, errors, and the result-fusion engine.
//!
//! This crate has no database dependencies (dependency level 0): everything
//! here is a pure, synchronous transform over already-materialized data.
//!
//! # Modules
//!
//! - [`error`]: Error types and Result alias
//! - [`rerank`]: RRF and weighted-rank fusion of two ranked lists
//! - [`types`]: Query result and execute-outcome types

pub mod error;
pub mod rerank;
pub mod types;

// Re-export key types at crate root for convenience
pub use error::{Error, Result};
pub use rerank::{
    DEFAULT_RANK_CONSTANT, RerankOption, RerankedItem, arctan_normalize, rerank, rrf_rerank,
    weighted_rank,
};
pub use types::{ExecuteOutcome, QueryResult};
