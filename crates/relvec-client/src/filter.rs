//! Metadata filter compilation.
//!
//! Translates a nested JSON filter expression into a SQL predicate over
//! `json_extract(meta, ?)` plus an ordered list of bind values for the `?`
//! placeholders. The JSON path (`$.field`) is itself a bind value, never
//! statement text, so field names cannot break or extend the statement no
//! matter what characters they contain.
//!
//! # Expression shape
//!
//! - `{"field": literal}` — equality against the extracted field
//! - `{"field": {"$op": value}}` — comparison, `$op` one of
//!   `$in`, `$nin`, `$gt`, `$gte`, `$lt`, `$lte`, `$eq`, `$ne`
//! - `{"$and": [...]}` / `{"$or": [...]}` — boolean combinators
//!
//! Sibling clauses at one level are joined with `AND`. Combinator and
//! operator keys match case-insensitively.
//!
//! # Leniency
//!
//! Two behaviors are deliberately lenient rather than strict:
//! non-object elements inside a combinator array are skipped, and a nested
//! map with no recognized operator is dropped with a warning (no
//! constraint). A bare operator at top level, or a combinator mapped to a
//! non-array, is a configuration error.

use serde_json::Value;

use relvec_core::{Error, Result};

/// A metadata filter expression: a JSON object as described in the module
/// docs.
pub type Filter = serde_json::Map<String, Value>;

/// Name of the JSON metadata column the compiled predicates read from.
pub const META_COLUMN: &str = "meta";

/// Comparison operators, in the priority order they are matched.
const OPERATORS: [&str; 8] = ["$in", "$nin", "$gt", "$gte", "$lt", "$lte", "$ne", "$eq"];

/// A bind value for a `?` placeholder in a compiled predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl BindValue {
    /// Convert a JSON scalar into a bind value. Null and nested values are
    /// not bindable.
    fn from_json(value: &Value) -> Option<BindValue> {
        match value {
            Value::String(s) => Some(BindValue::String(s.clone())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(BindValue::Int(i))
                } else {
                    n.as_f64().map(BindValue::Float)
                }
            }
            Value::Bool(b) => Some(BindValue::Bool(*b)),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// A compiled `WHERE` fragment plus its ordered bind values.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    /// SQL predicate text with `?` placeholders.
    pub sql: String,
    /// Bind values in placeholder order.
    pub binds: Vec<BindValue>,
}

impl FilterClause {
    /// The predicate that matches every row (absent filter).
    pub fn always_true() -> Self {
        Self {
            sql: "TRUE".to_string(),
            binds: Vec::new(),
        }
    }
}

/// Compile an optional filter expression into a `WHERE` fragment.
///
/// An absent filter compiles to an always-true predicate.
pub fn compile_filter(filter: Option<&Filter>) -> Result<FilterClause> {
    match filter {
        None => Ok(FilterClause::always_true()),
        Some(expression) => match compile_map(expression)? {
            None => Ok(FilterClause::always_true()),
            Some((sql, binds)) => Ok(FilterClause { sql, binds }),
        },
    }
}

/// Compile one expression level. Returns `None` when the level imposes no
/// constraint (every clause was dropped).
fn compile_map(expression: &Filter) -> Result<Option<(String, Vec<BindValue>)>> {
    let mut clauses: Vec<String> = Vec::new();
    let mut binds: Vec<BindValue> = Vec::new();

    for (key, value) in expression {
        let lowered = key.to_ascii_lowercase();
        match lowered.as_str() {
            "$and" | "$or" => {
                let joiner = if lowered == "$and" { " AND " } else { " OR " };
                let children = value.as_array().ok_or_else(|| {
                    Error::config(format!(
                        "combinator {key} must map to an array of sub-filters"
                    ))
                })?;

                let mut parts: Vec<String> = Vec::new();
                for child in children {
                    // Invalid siblings are skipped, not rejected.
                    if let Value::Object(map) = child {
                        if let Some((sql, child_binds)) = compile_map(map)? {
                            parts.push(sql);
                            binds.extend(child_binds);
                        }
                    }
                }
                if !parts.is_empty() {
                    clauses.push(format!("({})", parts.join(joiner)));
                }
            }
            op if OPERATORS.contains(&op) => {
                return Err(Error::config(format!(
                    "unexpected bare operator {key}: operators must be nested under a metadata field"
                )));
            }
            _ => match value {
                Value::Object(operator_map) => {
                    if let Some((sql, op_binds)) = compile_operator(key, operator_map)? {
                        clauses.push(sql);
                        binds.extend(op_binds);
                    }
                }
                Value::Null => {
                    clauses.push(format!("{} IS NULL", json_path_expr()));
                    binds.push(json_path_bind(key));
                }
                scalar => match BindValue::from_json(scalar) {
                    Some(bind) => {
                        clauses.push(format!("{} = ?", json_path_expr()));
                        binds.push(json_path_bind(key));
                        binds.push(bind);
                    }
                    None => {
                        log::warn!(
                            "Unsupported filter value for field {key:?}: expected a scalar \
                             or an operator map; clause dropped"
                        );
                    }
                },
            },
        }
    }

    if clauses.is_empty() {
        Ok(None)
    } else {
        Ok(Some((clauses.join(" AND "), binds)))
    }
}

/// Compile a `{field: {"$op": value}}` comparison. Returns `None` (clause
/// dropped, warning logged) when no operator is recognized or the value is
/// not usable with the operator.
fn compile_operator(
    field: &str,
    operator_map: &Filter,
) -> Result<Option<(String, Vec<BindValue>)>> {
    let expr = json_path_expr();

    for op in OPERATORS {
        let Some(value) = lookup_case_insensitive(operator_map, op) else {
            continue;
        };

        return match op {
            "$in" | "$nin" => compile_membership(field, op, value),
            "$eq" if value.is_null() => Ok(Some((
                format!("{expr} IS NULL"),
                vec![json_path_bind(field)],
            ))),
            "$ne" if value.is_null() => Ok(Some((
                format!("{expr} IS NOT NULL"),
                vec![json_path_bind(field)],
            ))),
            _ => match BindValue::from_json(value) {
                Some(bind) => {
                    let comparison = match op {
                        "$gt" => ">",
                        "$gte" => ">=",
                        "$lt" => "<",
                        "$lte" => "<=",
                        "$ne" => "!=",
                        _ => "=",
                    };
                    Ok(Some((
                        format!("{expr} {comparison} ?"),
                        vec![json_path_bind(field), bind],
                    )))
                }
                None => {
                    log::warn!(
                        "Filter operator {op} on field {field:?} has a non-scalar value; \
                         clause dropped"
                    );
                    Ok(None)
                }
            },
        };
    }

    log::warn!(
        "Unsupported filter operator in {operator_map:?} for field {field:?}. Consider using \
         one of $in, $nin, $gt, $gte, $lt, $lte, $eq, $ne, $or, $and; clause dropped"
    );
    Ok(None)
}

/// Compile `$in` / `$nin`. The empty set contains nothing, so `$in []`
/// matches no row and `$nin []` matches every row.
fn compile_membership(
    field: &str,
    op: &str,
    value: &Value,
) -> Result<Option<(String, Vec<BindValue>)>> {
    let elements = value.as_array().ok_or_else(|| {
        Error::config(format!("operator {op} on field {field:?} must map to an array"))
    })?;

    let mut element_binds: Vec<BindValue> = Vec::new();
    for element in elements {
        match BindValue::from_json(element) {
            Some(bind) => element_binds.push(bind),
            None => log::warn!(
                "Filter operator {op} on field {field:?}: non-scalar element skipped"
            ),
        }
    }

    if element_binds.is_empty() {
        let sql = if op == "$in" { "FALSE" } else { "TRUE" };
        return Ok(Some((sql.to_string(), Vec::new())));
    }

    let placeholders = vec!["?"; element_binds.len()].join(", ");
    let keyword = if op == "$in" { "IN" } else { "NOT IN" };
    let mut binds = vec![json_path_bind(field)];
    binds.extend(element_binds);
    Ok(Some((
        format!("{} {keyword} ({placeholders})", json_path_expr()),
        binds,
    )))
}

/// Case-insensitive key lookup in an operator map.
fn lookup_case_insensitive<'a>(map: &'a Filter, wanted: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(wanted))
        .map(|(_, value)| value)
}

/// Extraction expression for a metadata field. The path placeholder is
/// filled by [`json_path_bind`], keeping field names out of statement text.
fn json_path_expr() -> String {
    format!("json_extract({META_COLUMN}, ?)")
}

/// The JSON path bind for a metadata field.
fn json_path_bind(field: &str) -> BindValue {
    BindValue::String(format!("$.{field}"))
}

// ============================================================================
// Tests
// ============================================================================
