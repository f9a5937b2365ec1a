//! The collection client: similarity search, full-text search, hybrid
//! queries, and record maintenance over one collection table.
//!
//! Statement text is built by pure functions so shape and bind ordering are
//! testable without a database; the async methods only bind and execute.
//!
//! A [`VectorClient`] owns a connection pool plus the reconciled
//! [`TableDescriptor`]. The pool is shared handle state, never part of
//! value-copy semantics: callers that need a second handle clone the
//! descriptor and reuse the pool via [`VectorClient::pool`].

use serde_json::Value;
use sqlx::mysql::MySqlRow;
use sqlx::{Column, MySqlPool, Row, TypeInfo};
use uuid::Uuid;

use relvec_core::{Error, ExecuteOutcome, QueryResult, RerankOption, RerankedItem, Result, rerank};

use crate::codec;
use crate::distance::DistanceStrategy;
use crate::filter::{BindValue, Filter, FilterClause, compile_filter};
use crate::schema::{self, TableDescriptor};

// ============================================================================
// Options
// ============================================================================

/// Options for opening a collection.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Table backing the collection.
    pub table_name: String,
    /// Requested vector dimension. Unset adopts the physical column's.
    pub dimension: Option<usize>,
    /// Requested distance strategy. Unset adopts the physical column's,
    /// falling back to L2.
    pub distance: Option<DistanceStrategy>,
    /// Drop any existing table before creating a fresh one. Skips the
    /// compatibility check, since there is nothing left to be compatible
    /// with.
    pub drop_existing_table: bool,
}

impl ClientOptions {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            dimension: None,
            distance: None,
            drop_existing_table: false,
        }
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    pub fn with_distance(mut self, distance: DistanceStrategy) -> Self {
        self.distance = Some(distance);
        self
    }

    pub fn with_drop_existing_table(mut self, drop: bool) -> Self {
        self.drop_existing_table = drop;
        self
    }
}

// ============================================================================
// Client
// ============================================================================

/// Client handle for one collection table.
pub struct VectorClient {
    pool: MySqlPool,
    descriptor: TableDescriptor,
}

impl VectorClient {
    /// Connect to the database and open (or create) the collection.
    pub async fn connect(url: &str, options: ClientOptions) -> Result<Self> {
        let pool = MySqlPool::connect(url)
            .await
            .map_err(|e| Error::database(format!("failed to connect: {e}")))?;
        Self::with_pool(pool, options).await
    }

    /// Open (or create) the collection over an existing pool.
    ///
    /// Reconciles the requested dimension and distance against the physical
    /// embedding column, then creates the table and its indexes
    /// idempotently. A disagreement with existing data is
    /// [`Error::ColumnMismatch`].
    pub async fn with_pool(pool: MySqlPool, options: ClientOptions) -> Result<Self> {
        let physical = if options.drop_existing_table {
            schema::drop_table(&pool, &options.table_name).await?;
            None
        } else {
            schema::probe_embedding_column(&pool, &options.table_name).await?
        };

        let descriptor = schema::reconcile_descriptor(
            &options.table_name,
            options.dimension,
            options.distance,
            physical.as_ref(),
        )?;
        schema::ensure_schema(&pool, &descriptor).await?;
        log::info!(
            "opened collection {} ({})",
            descriptor.name,
            descriptor.column_definition()
        );

        Ok(Self { pool, descriptor })
    }

    /// The reconciled table descriptor.
    pub fn descriptor(&self) -> &TableDescriptor {
        &self.descriptor
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Insert a batch of records, returning the assigned ids.
    ///
    /// `documents` and `embeddings` must have equal length; `metadatas` and
    /// `ids`, when given, must match too. Missing ids are generated as UUID
    /// v4 strings, missing metadata defaults to `{}`. The batch runs in one
    /// transaction, so an encode failure mid-batch writes nothing.
    pub async fn insert(
        &self,
        documents: &[String],
        embeddings: &[Vec<f64>],
        metadatas: Option<Vec<Value>>,
        ids: Option<Vec<String>>,
    ) -> Result<Vec<String>> {
        let count = documents.len();
        if embeddings.len() != count {
            return Err(Error::config(format!(
                "insert got {count} documents but {} embeddings",
                embeddings.len()
            )));
        }
        let metadatas = match metadatas {
            Some(metadatas) if metadatas.len() != count => {
                return Err(Error::config(format!(
                    "insert got {count} documents but {} metadata objects",
                    metadatas.len()
                )));
            }
            Some(metadatas) => metadatas,
            None => vec![Value::Object(Default::default()); count],
        };
        let ids = match ids {
            Some(ids) if ids.len() != count => {
                return Err(Error::config(format!(
                    "insert got {count} documents but {} ids",
                    ids.len()
                )));
            }
            Some(ids) => ids,
            None => (0..count).map(|_| Uuid::new_v4().to_string()).collect(),
        };

        let sql = insert_sql(&self.descriptor.name);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::database(format!("failed to begin transaction: {e}")))?;

        for (((id, document), embedding), metadata) in ids
            .iter()
            .zip(documents)
            .zip(embeddings)
            .zip(&metadatas)
        {
            let literal = codec::encode_vector(embedding, self.descriptor.dimension)?;
            sqlx::query(&sql)
                .bind(id)
                .bind(literal)
                .bind(document)
                .bind(sqlx::types::Json(metadata))
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::database(format!("failed to insert record {id}: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::database(format!("failed to commit insert: {e}")))?;
        log::debug!("inserted {count} records into {}", self.descriptor.name);
        Ok(ids)
    }

    /// Delete records by id list, metadata filter, or both (intersection).
    ///
    /// With neither ids nor filter, every record matches the always-true
    /// predicate and the table is emptied.
    pub async fn delete(&self, ids: Option<&[String]>, filter: Option<&Filter>) -> Result<()> {
        if let Some(ids) = ids {
            if ids.is_empty() {
                // An empty id set intersects to nothing.
                return Ok(());
            }
        }

        let clause = compile_filter(filter)?;
        let id_count = ids.map_or(0, <[String]>::len);
        let sql = delete_sql(&self.descriptor.name, id_count, &clause);

        let mut query = sqlx::query(&sql);
        if let Some(ids) = ids {
            for id in ids {
                query = query.bind(id);
            }
        }
        query = bind_filter(query, &clause.binds);

        let outcome = query
            .execute(&self.pool)
            .await
            .map_err(|e| Error::database(format!("failed to delete: {e}")))?;
        log::debug!(
            "deleted {} records from {}",
            outcome.rows_affected(),
            self.descriptor.name
        );
        Ok(())
    }

    /// Drop the collection table.
    pub async fn drop_table(&self) -> Result<()> {
        schema::drop_table(&self.pool, &self.descriptor.name).await
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Similarity search: the `k` records nearest to `query_vector` under
    /// the collection's distance strategy, ascending by distance.
    ///
    /// Bounds are applied when present, including a bound of `0.0`: presence
    /// is what matters, not the value.
    pub async fn query(
        &self,
        query_vector: &[f64],
        k: usize,
        filter: Option<&Filter>,
        dis_lower_bound: Option<f64>,
        dis_upper_bound: Option<f64>,
    ) -> Result<Vec<QueryResult>> {
        let literal = codec::encode_vector(query_vector, self.descriptor.dimension)?;
        let clause = compile_filter(filter)?;
        let sql = vector_search_sql(
            &self.descriptor.name,
            self.descriptor.distance,
            &clause,
            dis_lower_bound,
            dis_upper_bound,
        );

        let mut query = sqlx::query(&sql).bind(&literal);
        query = bind_filter(query, &clause.binds);
        if let Some(lower) = dis_lower_bound {
            query = query.bind(&literal).bind(lower);
        }
        if let Some(upper) = dis_upper_bound {
            query = query.bind(&literal).bind(upper);
        }
        query = query.bind(k as i64);

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database(format!("vector search failed: {e}")))?;
        rows.iter().map(|row| decode_result_row(row, "distance")).collect()
    }

    /// Similarity search for several query vectors, one result list per
    /// vector, in input order.
    pub async fn batch_query(
        &self,
        query_vectors: &[Vec<f64>],
        k: usize,
        filter: Option<&Filter>,
        dis_lower_bound: Option<f64>,
        dis_upper_bound: Option<f64>,
    ) -> Result<Vec<Vec<QueryResult>>> {
        let mut results = Vec::with_capacity(query_vectors.len());
        for vector in query_vectors {
            results.push(
                self.query(vector, k, filter, dis_lower_bound, dis_upper_bound)
                    .await?,
            );
        }
        Ok(results)
    }

    /// Full-text search: the `k` records best matching the keywords in
    /// boolean mode (every keyword required), descending by relevance.
    ///
    /// An empty keyword list returns an empty result without touching the
    /// database.
    pub async fn full_text_query(
        &self,
        keywords: &[String],
        k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<QueryResult>> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let terms = boolean_mode_terms(keywords);
        let clause = compile_filter(filter)?;
        let sql = fulltext_search_sql(&self.descriptor.name, &clause);

        let mut query = sqlx::query(&sql).bind(&terms);
        query = bind_filter(query, &clause.binds);
        query = query.bind(&terms).bind(k as i64);

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database(format!("full-text search failed: {e}")))?;
        rows.iter().map(|row| decode_result_row(row, "score")).collect()
    }

    /// Hybrid search: run the similarity and full-text searches
    /// concurrently, then fuse their document lists with the rerank engine.
    ///
    /// Records without a stored document cannot participate in fusion and
    /// are skipped. The default option is RRF with rank constant 60.
    pub async fn mix_query(
        &self,
        query_vector: &[f64],
        keywords: &[String],
        rerank_option: Option<&RerankOption>,
        k: usize,
        filter: Option<&Filter>,
        dis_lower_bound: Option<f64>,
        dis_upper_bound: Option<f64>,
    ) -> Result<Vec<RerankedItem>> {
        let (vector_results, full_text_results) = tokio::try_join!(
            self.query(query_vector, k, filter, dis_lower_bound, dis_upper_bound),
            self.full_text_query(keywords, k, filter),
        )?;

        let vector_docs = documents_in_rank_order(&vector_results);
        let full_text_docs = documents_in_rank_order(&full_text_results);

        let default_option = RerankOption::default();
        let option = rerank_option.unwrap_or(&default_option);
        rerank(&vector_docs, &full_text_docs, k, option)
    }

    // ------------------------------------------------------------------------
    // Escape hatch
    // ------------------------------------------------------------------------

    /// Run an arbitrary statement with positional `?` parameters.
    ///
    /// Never returns an error: failures are folded into the outcome
    /// envelope so scripted callers can branch on `success`. SELECT
    /// statements yield `rows` as JSON objects, everything else yields
    /// `rows_affected`.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> ExecuteOutcome {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_json_param(query, param);
        }

        let is_select = sql
            .trim_start()
            .get(..6)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("select"));

        if is_select {
            match query.fetch_all(&self.pool).await {
                Ok(rows) => ExecuteOutcome::rows(rows.iter().map(row_to_json).collect()),
                Err(e) => {
                    log::error!("SQL execution error: {e}");
                    ExecuteOutcome::failure(e.to_string())
                }
            }
        } else {
            match query.execute(&self.pool).await {
                Ok(outcome) => ExecuteOutcome::affected(outcome.rows_affected()),
                Err(e) => {
                    log::error!("SQL execution error: {e}");
                    ExecuteOutcome::failure(e.to_string())
                }
            }
        }
    }
}

// ============================================================================
// Statement builders (pure)
// ============================================================================

fn insert_sql(table: &str) -> String {
    format!("INSERT INTO {table} (id, embedding, document, meta) VALUES (?, ?, ?, ?)")
}

fn delete_sql(table: &str, id_count: usize, clause: &FilterClause) -> String {
    if id_count == 0 {
        format!("DELETE FROM {table} WHERE ({})", clause.sql)
    } else {
        let placeholders = vec!["?"; id_count].join(", ");
        format!(
            "DELETE FROM {table} WHERE id IN ({placeholders}) AND ({})",
            clause.sql
        )
    }
}

/// Similarity-search statement. The distance expression is repeated in the
/// bound predicates because an alias is not visible in `WHERE`.
///
/// Only the presence of a bound matters here, never its value: `Some(0.0)`
/// emits its predicate exactly like any other bound.
fn vector_search_sql(
    table: &str,
    distance: DistanceStrategy,
    clause: &FilterClause,
    lower_bound: Option<f64>,
    upper_bound: Option<f64>,
) -> String {
    let function = distance.sql_function();
    let mut sql = format!(
        "SELECT id, meta, document, {function}(embedding, ?) AS distance \
         FROM {table} WHERE ({})",
        clause.sql
    );
    if lower_bound.is_some() {
        sql.push_str(&format!(" AND {function}(embedding, ?) >= ?"));
    }
    if upper_bound.is_some() {
        sql.push_str(&format!(" AND {function}(embedding, ?) <= ?"));
    }
    sql.push_str(" ORDER BY distance ASC LIMIT ?");
    sql
}

/// Full-text statement. The MATCH expression appears twice: once as the
/// score column and once as a predicate, so only matching rows come back.
fn fulltext_search_sql(table: &str, clause: &FilterClause) -> String {
    format!(
        "SELECT id, meta, document, MATCH(document) AGAINST(? IN BOOLEAN MODE) AS score \
         FROM {table} WHERE ({}) AND MATCH(document) AGAINST(? IN BOOLEAN MODE) \
         ORDER BY score DESC LIMIT ?",
        clause.sql
    )
}

/// Join keywords as required boolean-mode terms: `["a", "b"]` becomes
/// `"+a +b"`.
fn boolean_mode_terms(keywords: &[String]) -> String {
    keywords
        .iter()
        .map(|keyword| format!("+{keyword}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Document texts in rank order, skipping records with no stored document.
fn documents_in_rank_order(results: &[QueryResult]) -> Vec<String> {
    results
        .iter()
        .filter_map(|result| result.document.clone())
        .collect()
}

// ============================================================================
// Binding and decoding
// ============================================================================

type MySqlQuery<'q> = sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments>;

fn bind_filter<'q>(mut query: MySqlQuery<'q>, binds: &'q [BindValue]) -> MySqlQuery<'q> {
    for bind in binds {
        query = match bind {
            BindValue::String(s) => query.bind(s),
            BindValue::Int(i) => query.bind(i),
            BindValue::Float(f) => query.bind(f),
            BindValue::Bool(b) => query.bind(b),
        };
    }
    query
}

fn bind_json_param<'q>(query: MySqlQuery<'q>, param: &'q Value) -> MySqlQuery<'q> {
    match param {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else {
                query.bind(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => query.bind(s),
        nested => query.bind(sqlx::types::Json(nested)),
    }
}

fn decode_result_row(row: &MySqlRow, score_column: &str) -> Result<QueryResult> {
    let id: String = row
        .try_get("id")
        .map_err(|e| Error::database(format!("failed to decode id: {e}")))?;
    let metadata = row
        .try_get::<Option<sqlx::types::Json<Value>>, _>("meta")
        .map_err(|e| Error::database(format!("failed to decode meta: {e}")))?
        .map(|json| json.0)
        .unwrap_or_else(|| Value::Object(Default::default()));
    let document: Option<String> = row
        .try_get("document")
        .map_err(|e| Error::database(format!("failed to decode document: {e}")))?;
    let distance = decode_f64(row, score_column)
        .map_err(|e| Error::database(format!("failed to decode {score_column}: {e}")))?;

    Ok(QueryResult {
        id,
        document,
        metadata,
        distance,
    })
}

fn decode_f64(row: &MySqlRow, column: &str) -> std::result::Result<f64, sqlx::Error> {
    match row.try_get::<f64, _>(column) {
        Ok(value) => Ok(value),
        Err(_) => row.try_get::<f32, _>(column).map(f64::from),
    }
}

/// Best-effort conversion of a row into a JSON object, keyed by column
/// name. Unrecognized column types fall back to their string form, or null.
fn row_to_json(row: &MySqlRow) -> Value {
    let mut object = serde_json::Map::with_capacity(row.columns().len());
    for column in row.columns() {
        let name = column.name();
        let value = match column.type_info().name() {
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "BOOLEAN" => row
                .try_get::<Option<i64>, _>(name)
                .map(|v| v.map_or(Value::Null, Value::from))
                .unwrap_or(Value::Null),
            "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
            | "BIGINT UNSIGNED" => row
                .try_get::<Option<u64>, _>(name)
                .map(|v| v.map_or(Value::Null, Value::from))
                .unwrap_or(Value::Null),
            "FLOAT" => row
                .try_get::<Option<f32>, _>(name)
                .map(|v| v.map_or(Value::Null, |f| Value::from(f64::from(f))))
                .unwrap_or(Value::Null),
            "DOUBLE" => row
                .try_get::<Option<f64>, _>(name)
                .map(|v| v.map_or(Value::Null, Value::from))
                .unwrap_or(Value::Null),
            "JSON" => row
                .try_get::<Option<sqlx::types::Json<Value>>, _>(name)
                .map(|v| v.map_or(Value::Null, |json| json.0))
                .unwrap_or(Value::Null),
            "DATETIME" | "TIMESTAMP" => row
                .try_get::<Option<chrono::NaiveDateTime>, _>(name)
                .map(|v| v.map_or(Value::Null, |dt| Value::from(dt.to_string())))
                .unwrap_or(Value::Null),
            _ => row
                .try_get::<Option<String>, _>(name)
                .map(|v| v.map_or(Value::Null, Value::from))
                .unwrap_or(Value::Null),
        };
        object.insert(name.to_string(), value);
    }
    Value::Object(object)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn clause_for(value: serde_json::Value) -> FilterClause {
        let filter = value.as_object().expect("object").clone();
        compile_filter(Some(&filter)).expect("valid filter")
    }

    #[test]
    fn test_client_options_builder() {
        let options = ClientOptions::new("docs")
            .with_dimension(3)
            .with_distance(DistanceStrategy::L2)
            .with_drop_existing_table(true);
        assert_eq!(options.table_name, "docs");
        assert_eq!(options.dimension, Some(3));
        assert_eq!(options.distance, Some(DistanceStrategy::L2));
        assert!(options.drop_existing_table);
    }

    #[test]
    fn test_insert_sql() {
        assert_eq!(
            insert_sql("docs"),
            "INSERT INTO docs (id, embedding, document, meta) VALUES (?, ?, ?, ?)"
        );
    }

    #[test]
    fn test_delete_sql_filter_only() {
        let clause = clause_for(json!({"a": 1}));
        assert_eq!(
            delete_sql("docs", 0, &clause),
            "DELETE FROM docs WHERE (json_extract(meta, ?) = ?)"
        );
    }

    #[test]
    fn test_delete_sql_ids_and_filter() {
        let clause = clause_for(json!({"a": 1}));
        assert_eq!(
            delete_sql("docs", 2, &clause),
            "DELETE FROM docs WHERE id IN (?, ?) AND (json_extract(meta, ?) = ?)"
        );
    }

    #[test]
    fn test_delete_sql_no_constraints_matches_all() {
        let clause = FilterClause::always_true();
        assert_eq!(delete_sql("docs", 0, &clause), "DELETE FROM docs WHERE (TRUE)");
    }

    #[test]
    fn test_vector_search_sql_without_bounds() {
        let clause = FilterClause::always_true();
        let sql = vector_search_sql("docs", DistanceStrategy::L2, &clause, None, None);
        assert_eq!(
            sql,
            "SELECT id, meta, document, l2_distance(embedding, ?) AS distance \
             FROM docs WHERE (TRUE) ORDER BY distance ASC LIMIT ?"
        );
    }

    #[test]
    fn test_vector_search_sql_with_bounds() {
        let clause = clause_for(json!({"lang": "en"}));
        let sql = vector_search_sql("docs", DistanceStrategy::L2, &clause, Some(0.5), Some(2.0));
        assert_eq!(
            sql,
            "SELECT id, meta, document, l2_distance(embedding, ?) AS distance \
             FROM docs WHERE (json_extract(meta, ?) = ?) \
             AND l2_distance(embedding, ?) >= ? \
             AND l2_distance(embedding, ?) <= ? \
             ORDER BY distance ASC LIMIT ?"
        );
    }

    #[test]
    fn test_vector_search_sql_lower_bound_only() {
        let clause = FilterClause::always_true();
        let sql = vector_search_sql("docs", DistanceStrategy::L2, &clause, Some(1.0), None);
        assert!(sql.contains(">= ?"));
        assert!(!sql.contains("<= ?"));
    }

    #[test]
    fn test_vector_search_sql_zero_bound_is_a_real_constraint() {
        // Presence of a bound decides the predicate, not its value: a
        // lower bound of exactly 0.0 must still constrain, unlike None.
        let clause = FilterClause::always_true();
        let bounded = vector_search_sql("docs", DistanceStrategy::L2, &clause, Some(0.0), None);
        assert!(bounded.contains("l2_distance(embedding, ?) >= ?"));

        let unbounded = vector_search_sql("docs", DistanceStrategy::L2, &clause, None, None);
        assert!(!unbounded.contains(">= ?"));

        let capped = vector_search_sql("docs", DistanceStrategy::L2, &clause, None, Some(0.0));
        assert!(capped.contains("l2_distance(embedding, ?) <= ?"));
    }

    #[test]
    fn test_fulltext_search_sql_constrains_matches() {
        let clause = FilterClause::always_true();
        let sql = fulltext_search_sql("docs", &clause);
        assert_eq!(
            sql,
            "SELECT id, meta, document, MATCH(document) AGAINST(? IN BOOLEAN MODE) AS score \
             FROM docs WHERE (TRUE) AND MATCH(document) AGAINST(? IN BOOLEAN MODE) \
             ORDER BY score DESC LIMIT ?"
        );
    }

    #[test]
    fn test_boolean_mode_terms() {
        let keywords = vec!["rust".to_string(), "search".to_string()];
        assert_eq!(boolean_mode_terms(&keywords), "+rust +search");
        assert_eq!(boolean_mode_terms(&["solo".to_string()]), "+solo");
    }

    #[test]
    fn test_documents_in_rank_order_skips_absent() {
        let results = vec![
            QueryResult {
                id: "1".to_string(),
                document: Some("first".to_string()),
                metadata: Value::Null,
                distance: 0.1,
            },
            QueryResult {
                id: "2".to_string(),
                document: None,
                metadata: Value::Null,
                distance: 0.2,
            },
            QueryResult {
                id: "3".to_string(),
                document: Some("third".to_string()),
                metadata: Value::Null,
                distance: 0.3,
            },
        ];
        assert_eq!(documents_in_rank_order(&results), vec!["first", "third"]);
    }
}
