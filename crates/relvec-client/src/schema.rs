//! Table schema management and compatibility reconciliation.
//!
//! A collection lives in one table with a fixed column layout:
//!
//! | column       | type                  | purpose                        |
//! |--------------|-----------------------|--------------------------------|
//! | `id`         | `VARCHAR(36)` PK      | record identifier              |
//! | `embedding`  | `vecf64(N)`           | vector payload                 |
//! | `document`   | `TEXT`                | full-text searchable body      |
//! | `meta`       | `JSON`                | caller metadata                |
//! | `create_time`| `DATETIME`            | server-side insert timestamp   |
//! | `update_time`| `DATETIME`            | server-side update timestamp   |
//!
//! Dimension and distance strategy are immutable once the table holds data.
//! On open, the requested descriptor is reconciled against the physical
//! embedding column (probed from `INFORMATION_SCHEMA.COLUMNS`): an unset
//! side adopts the other, a disagreement is a [`Error::ColumnMismatch`]
//! carrying both column definitions.
//!
//! All DDL here is idempotent. Index creation is skip-if-existing via an
//! `INFORMATION_SCHEMA.STATISTICS` probe, since the engine's
//! `CREATE INDEX` has no `IF NOT EXISTS` form.

use std::sync::LazyLock;

use regex::Regex;
use sqlx::{MySqlPool, Row};

use relvec_core::{Error, Result};

use crate::distance::DistanceStrategy;
use crate::filter::META_COLUMN;

/// Primary-key column name.
pub const ID_COLUMN: &str = "id";
/// Vector payload column name.
pub const EMBEDDING_COLUMN: &str = "embedding";
/// Full-text document column name.
pub const DOCUMENT_COLUMN: &str = "document";

/// Everything needed to address and validate one collection table.
///
/// This is the value-copy identity of a client: cloning a descriptor never
/// clones a connection pool.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDescriptor {
    /// Table name.
    pub name: String,
    /// Vector dimension, when known. `None` defers to whatever the
    /// physical column declares.
    pub dimension: Option<usize>,
    /// Distance strategy the table's index was built with.
    pub distance: DistanceStrategy,
}

impl TableDescriptor {
    pub fn new(
        name: impl Into<String>,
        dimension: Option<usize>,
        distance: DistanceStrategy,
    ) -> Self {
        Self {
            name: name.into(),
            dimension,
            distance,
        }
    }

    /// The embedding column definition this descriptor implies, in the form
    /// used by DDL and mismatch diagnostics:
    /// `vecf64(3) COMMENT 'hnsw(distance=l2)'`.
    pub fn column_definition(&self) -> String {
        format!(
            "{} COMMENT 'hnsw(distance={})'",
            vector_type_text(self.dimension),
            self.distance
        )
    }

    /// Name of the vector index over the embedding column.
    pub fn vector_index_name(&self) -> String {
        format!("idx_{}_{EMBEDDING_COLUMN}", self.name)
    }
}

/// The physical embedding column as probed from the database, before
/// reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalColumn {
    pub dimension: Option<usize>,
    pub distance_tag: Option<String>,
}

fn vector_type_text(dimension: Option<usize>) -> String {
    match dimension {
        Some(dim) => format!("vecf64({dim})"),
        None => "vecf64".to_string(),
    }
}

// ============================================================================
// Reconciliation
// ============================================================================

/// Reconcile the caller's requested dimension and distance against the
/// physical embedding column.
///
/// Either side may be unset; the set side wins. Both set and disagreeing is
/// a [`Error::ColumnMismatch`]. No physical column (table absent) accepts
/// the request as-is, with the distance defaulting to L2.
pub fn reconcile_descriptor(
    table_name: &str,
    requested_dimension: Option<usize>,
    requested_distance: Option<DistanceStrategy>,
    physical: Option<&PhysicalColumn>,
) -> Result<TableDescriptor> {
    let mut dimension = requested_dimension;
    let mut distance = requested_distance;

    if let Some(column) = physical {
        if let Some(actual_dim) = column.dimension {
            match dimension {
                None => dimension = Some(actual_dim),
                Some(dim) if dim != actual_dim => {
                    return Err(Error::column_mismatch(
                        vector_type_text(Some(actual_dim)),
                        vector_type_text(Some(dim)),
                    ));
                }
                Some(_) => {}
            }
        }

        if let Some(actual_tag) = column.distance_tag.as_deref() {
            match distance {
                None => distance = Some(actual_tag.parse()?),
                Some(strategy) if strategy.as_str() != actual_tag => {
                    return Err(Error::column_mismatch(
                        format!(
                            "{} COMMENT 'hnsw(distance={actual_tag})'",
                            vector_type_text(column.dimension)
                        ),
                        format!(
                            "{} COMMENT 'hnsw(distance={strategy})'",
                            vector_type_text(dimension)
                        ),
                    ));
                }
                Some(_) => {}
            }
        }
    }

    Ok(TableDescriptor::new(
        table_name,
        dimension,
        DistanceStrategy::resolve(distance),
    ))
}

/// Extract the dimension and distance tag from a physical column
/// definition. Both parts are optional: a bare `vecf64` column has no
/// dimension, and an uncommented column has no recorded distance.
pub fn extract_column_info(column_type: &str, column_comment: &str) -> PhysicalColumn {
    static DIMENSION_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)(?:vecf64|vector)(?:\((\d+)\))?").expect("static regex")
    });
    static DISTANCE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"distance=([^,\)]+)").expect("static regex"));

    let dimension = DIMENSION_RE
        .captures(column_type)
        .and_then(|captures| captures.get(1))
        .and_then(|group| group.as_str().parse::<usize>().ok());

    let distance_tag = DISTANCE_RE
        .captures(column_comment)
        .and_then(|captures| captures.get(1))
        .map(|group| group.as_str().to_string());

    PhysicalColumn {
        dimension,
        distance_tag,
    }
}

// ============================================================================
// DDL builders (pure)
// ============================================================================

pub fn create_table_sql(descriptor: &TableDescriptor) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n\
         \x20   {ID_COLUMN} VARCHAR(36) NOT NULL,\n\
         \x20   {EMBEDDING_COLUMN} {vector_type} NOT NULL COMMENT 'hnsw(distance={distance})',\n\
         \x20   {DOCUMENT_COLUMN} TEXT,\n\
         \x20   {META_COLUMN} JSON,\n\
         \x20   create_time DATETIME DEFAULT CURRENT_TIMESTAMP,\n\
         \x20   update_time DATETIME DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,\n\
         \x20   PRIMARY KEY ({ID_COLUMN})\n\
         )",
        table = descriptor.name,
        vector_type = vector_type_text(descriptor.dimension),
        distance = descriptor.distance,
    )
}

pub fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {table}")
}

pub fn create_vector_index_sql(descriptor: &TableDescriptor) -> String {
    format!(
        "CREATE INDEX {index} USING hnsw ON {table}({EMBEDDING_COLUMN}) OP_TYPE \"{op_type}\"",
        index = descriptor.vector_index_name(),
        table = descriptor.name,
        op_type = descriptor.distance.index_op_type(),
    )
}

pub fn fulltext_document_index_sql(table: &str) -> (String, String) {
    let name = "ftidx_document".to_string();
    let sql = format!("CREATE FULLTEXT INDEX {name} ON {table}({DOCUMENT_COLUMN})");
    (name, sql)
}

pub fn fulltext_meta_index_sql(table: &str) -> (String, String) {
    let name = "ftidx_meta".to_string();
    let sql = format!("CREATE FULLTEXT INDEX {name} ON {table}({META_COLUMN}) WITH PARSER json");
    (name, sql)
}

const ENABLE_HNSW_INDEX_SQL: &str = "SET experimental_hnsw_index = 1";
const ENABLE_FULLTEXT_INDEX_SQL: &str = "SET experimental_fulltext_index = 1";

const COLUMN_PROBE_SQL: &str = "SELECT COLUMN_TYPE, COLUMN_COMMENT \
     FROM INFORMATION_SCHEMA.COLUMNS \
     WHERE TABLE_NAME = ? AND COLUMN_NAME = ?";

const INDEX_EXISTS_SQL: &str = "SELECT COUNT(*) \
     FROM INFORMATION_SCHEMA.STATISTICS \
     WHERE TABLE_NAME = ? AND INDEX_NAME = ?";

// ============================================================================
// Database operations
// ============================================================================

/// Probe the physical embedding column. `None` means the table (or the
/// column) does not exist yet.
pub async fn probe_embedding_column(
    pool: &MySqlPool,
    table: &str,
) -> Result<Option<PhysicalColumn>> {
    let row = sqlx::query(COLUMN_PROBE_SQL)
        .bind(table)
        .bind(EMBEDDING_COLUMN)
        .fetch_optional(pool)
        .await
        .map_err(|e| Error::database(format!("failed to probe embedding column: {e}")))?;

    let Some(row) = row else {
        return Ok(None);
    };

    let column_type: String = row
        .try_get("COLUMN_TYPE")
        .map_err(|e| Error::database(format!("failed to decode COLUMN_TYPE: {e}")))?;
    let column_comment: String = row
        .try_get("COLUMN_COMMENT")
        .map_err(|e| Error::database(format!("failed to decode COLUMN_COMMENT: {e}")))?;

    Ok(Some(extract_column_info(&column_type, &column_comment)))
}

/// Whether the named index exists on the table.
pub async fn index_exists(pool: &MySqlPool, table: &str, index: &str) -> Result<bool> {
    let row = sqlx::query(INDEX_EXISTS_SQL)
        .bind(table)
        .bind(index)
        .fetch_one(pool)
        .await
        .map_err(|e| Error::database(format!("failed to probe index {index}: {e}")))?;

    let count: i64 = row
        .try_get(0)
        .map_err(|e| Error::database(format!("failed to decode index count: {e}")))?;
    Ok(count > 0)
}

/// Create the table and its indexes if they do not exist yet.
pub async fn ensure_schema(pool: &MySqlPool, descriptor: &TableDescriptor) -> Result<()> {
    sqlx::query(&create_table_sql(descriptor))
        .execute(pool)
        .await
        .map_err(|e| {
            Error::database(format!("failed to create table {}: {e}", descriptor.name))
        })?;

    let vector_index = descriptor.vector_index_name();
    if !index_exists(pool, &descriptor.name, &vector_index).await? {
        sqlx::query(ENABLE_HNSW_INDEX_SQL)
            .execute(pool)
            .await
            .map_err(|e| Error::database(format!("failed to enable hnsw indexing: {e}")))?;
        sqlx::query(&create_vector_index_sql(descriptor))
            .execute(pool)
            .await
            .map_err(|e| {
                Error::database(format!("failed to create vector index {vector_index}: {e}"))
            })?;
        log::info!("created vector index {vector_index} on {}", descriptor.name);
    }

    let fulltext_indexes = [
        fulltext_document_index_sql(&descriptor.name),
        fulltext_meta_index_sql(&descriptor.name),
    ];
    for (name, sql) in fulltext_indexes {
        if index_exists(pool, &descriptor.name, &name).await? {
            continue;
        }
        sqlx::query(ENABLE_FULLTEXT_INDEX_SQL)
            .execute(pool)
            .await
            .map_err(|e| Error::database(format!("failed to enable fulltext indexing: {e}")))?;
        sqlx::query(&sql)
            .execute(pool)
            .await
            .map_err(|e| {
                Error::database(format!("failed to create fulltext index {name}: {e}"))
            })?;
        log::info!("created fulltext index {name} on {}", descriptor.name);
    }

    Ok(())
}

/// Drop the collection table if it exists.
pub async fn drop_table(pool: &MySqlPool, table: &str) -> Result<()> {
    sqlx::query(&drop_table_sql(table))
        .execute(pool)
        .await
        .map_err(|e| Error::database(format!("failed to drop table {table}: {e}")))?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_with_dimension_and_comment() {
        let column = extract_column_info("vecf64(1536)", "hnsw(distance=l2)");
        assert_eq!(column.dimension, Some(1536));
        assert_eq!(column.distance_tag.as_deref(), Some("l2"));
    }

    #[test]
    fn test_extract_without_dimension() {
        let column = extract_column_info("vecf64", "");
        assert_eq!(column.dimension, None);
        assert_eq!(column.distance_tag, None);
    }

    #[test]
    fn test_extract_is_case_insensitive_on_type() {
        let column = extract_column_info("VECF64(4)", "hnsw(distance=l2)");
        assert_eq!(column.dimension, Some(4));
    }

    #[test]
    fn test_extract_distance_stops_at_delimiters() {
        let column = extract_column_info("vecf64(4)", "hnsw(distance=l2, m=16)");
        assert_eq!(column.distance_tag.as_deref(), Some("l2"));

        let column = extract_column_info("vecf64(4)", "hnsw(distance=l2)");
        assert_eq!(column.distance_tag.as_deref(), Some("l2"));
    }

    #[test]
    fn test_reconcile_no_physical_column_accepts_request() {
        let descriptor =
            reconcile_descriptor("docs", Some(3), Some(DistanceStrategy::L2), None).unwrap();
        assert_eq!(descriptor.name, "docs");
        assert_eq!(descriptor.dimension, Some(3));
        assert_eq!(descriptor.distance, DistanceStrategy::L2);
    }

    #[test]
    fn test_reconcile_defaults_distance_to_l2() {
        let descriptor = reconcile_descriptor("docs", Some(3), None, None).unwrap();
        assert_eq!(descriptor.distance, DistanceStrategy::L2);
    }

    #[test]
    fn test_reconcile_adopts_physical_dimension() {
        let physical = PhysicalColumn {
            dimension: Some(768),
            distance_tag: Some("l2".to_string()),
        };
        let descriptor = reconcile_descriptor("docs", None, None, Some(&physical)).unwrap();
        assert_eq!(descriptor.dimension, Some(768));
        assert_eq!(descriptor.distance, DistanceStrategy::L2);
    }

    #[test]
    fn test_reconcile_dimension_mismatch() {
        let physical = PhysicalColumn {
            dimension: Some(4),
            distance_tag: None,
        };
        let err = reconcile_descriptor("docs", Some(3), None, Some(&physical)).unwrap_err();
        match err {
            Error::ColumnMismatch { existing, expected } => {
                assert_eq!(existing, "vecf64(4)");
                assert_eq!(expected, "vecf64(3)");
            }
            other => panic!("expected ColumnMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_reconcile_distance_mismatch_names_both_definitions() {
        let physical = PhysicalColumn {
            dimension: Some(3),
            distance_tag: Some("cosine".to_string()),
        };
        let err = reconcile_descriptor("docs", Some(3), Some(DistanceStrategy::L2), Some(&physical))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("distance=cosine"));
        assert!(msg.contains("distance=l2"));
    }

    #[test]
    fn test_reconcile_unsupported_physical_distance_is_config_error() {
        // Adopting an unsupported physical tag must fail loudly, not
        // silently fall back.
        let physical = PhysicalColumn {
            dimension: Some(3),
            distance_tag: Some("cosine".to_string()),
        };
        let err = reconcile_descriptor("docs", Some(3), None, Some(&physical)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_create_table_sql_shape() {
        let descriptor = TableDescriptor::new("docs", Some(3), DistanceStrategy::L2);
        let sql = create_table_sql(&descriptor);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS docs"));
        assert!(sql.contains("embedding vecf64(3) NOT NULL COMMENT 'hnsw(distance=l2)'"));
        assert!(sql.contains("document TEXT"));
        assert!(sql.contains("meta JSON"));
        assert!(sql.contains("PRIMARY KEY (id)"));
    }

    #[test]
    fn test_create_table_sql_without_dimension() {
        let descriptor = TableDescriptor::new("docs", None, DistanceStrategy::L2);
        let sql = create_table_sql(&descriptor);
        assert!(sql.contains("embedding vecf64 NOT NULL"));
    }

    #[test]
    fn test_vector_index_sql() {
        let descriptor = TableDescriptor::new("docs", Some(3), DistanceStrategy::L2);
        assert_eq!(descriptor.vector_index_name(), "idx_docs_embedding");
        let sql = create_vector_index_sql(&descriptor);
        assert_eq!(
            sql,
            "CREATE INDEX idx_docs_embedding USING hnsw ON docs(embedding) \
             OP_TYPE \"vector_l2_ops\""
        );
    }

    #[test]
    fn test_fulltext_index_sql() {
        let (name, sql) = fulltext_document_index_sql("docs");
        assert_eq!(name, "ftidx_document");
        assert_eq!(sql, "CREATE FULLTEXT INDEX ftidx_document ON docs(document)");

        let (name, sql) = fulltext_meta_index_sql("docs");
        assert_eq!(name, "ftidx_meta");
        assert_eq!(
            sql,
            "CREATE FULLTEXT INDEX ftidx_meta ON docs(meta) WITH PARSER json"
        );
    }

    #[test]
    fn test_column_definition_text() {
        let descriptor = TableDescriptor::new("docs", Some(3), DistanceStrategy::L2);
        assert_eq!(
            descriptor.column_definition(),
            "vecf64(3) COMMENT 'hnsw(distance=l2)'"
        );
    }

    #[test]
    fn test_drop_table_sql() {
        assert_eq!(drop_table_sql("docs"), "DROP TABLE IF EXISTS docs");
    }
}
