//! Relvec Client — hybrid vector + full-text retrieval over a
//! MySQL-compatible vector database.
//!
//! One [`VectorClient`] addresses one collection table holding records of
//! `{id, embedding, document, meta}`. It offers similarity search,
//! boolean-mode full-text search, and a hybrid query that runs both and
//! fuses the ranked lists with the engine from `relvec-core`.
//!
//! # Modules
//!
//! - [`client`]: The `VectorClient` facade and statement builders
//! - [`codec`]: Vector literal encode/decode
//! - [`distance`]: Distance strategies
//! - [`filter`]: Metadata filter to SQL predicate compilation
//! - [`schema`]: Table DDL, probing, and compatibility reconciliation
//!
//! # Example
//!
//! ```no_run
//! use relvec_client::{ClientOptions, VectorClient};
//!
//! # async fn open() -> relvec_core::Result<()> {
//! let client = VectorClient::connect(
//!     "mysql://root@localhost:6001/vectors",
//!     ClientOptions::new("docs").with_dimension(3),
//! )
//! .await?;
//!
//! let hits = client.query(&[0.1, 0.2, 0.3], 5, None, None, None).await?;
//! # let _ = hits;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod distance;
pub mod filter;
pub mod schema;

// Re-export key types at crate root for convenience
pub use client::{ClientOptions, VectorClient};
pub use codec::{decode_vector, decode_vector_opt, encode_vector, encode_vector_opt};
pub use distance::DistanceStrategy;
pub use filter::{BindValue, Filter, FilterClause, compile_filter};
pub use schema::{PhysicalColumn, TableDescriptor};

// The fused-result and option types surface directly in this crate's API.
pub use relvec_core::{Error, ExecuteOutcome, QueryResult, RerankOption, RerankedItem, Result};
