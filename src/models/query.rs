//! Query-related data models.
//!
//! This module defines query parameters and query results.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// A parameter value for parameterized queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Arrays and objects, bound as JSON
    Json(JsonValue),
    /// Binary data
    #[serde(skip)]
    Bytes(Vec<u8>),
}

/// Renders the value the way it is written into query logs.
impl fmt::Display for QueryParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "'{}'", v.replace('\'', "''")),
            Self::Json(v) => write!(f, "{}", v),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<bool> for QueryParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for QueryParam {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for QueryParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for QueryParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for QueryParam {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<JsonValue> for QueryParam {
    fn from(v: JsonValue) -> Self {
        match v {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::String(s) => Self::String(s),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            other => Self::Json(other),
        }
    }
}

impl<T: Into<QueryParam>> From<Option<T>> for QueryParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Render a parameter list for structured logs, e.g. `[1, 'abc', NULL]`.
pub fn render_params(params: &[QueryParam]) -> String {
    let rendered: Vec<String> = params.iter().map(ToString::to_string).collect();
    format!("[{}]", rendered.join(", "))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// Database-specific type (e.g., "int8", "varchar", "TEXT")
    pub type_name: String,
}

impl ColumnMetadata {
    /// Create new column metadata.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Rows returned by a statement plus the number of rows it produced or touched.
///
/// Immutable once returned: fields are read through accessors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    columns: Vec<ColumnMetadata>,
    rows: Vec<serde_json::Map<String, JsonValue>>,
    row_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    rows_affected: Option<u64>,
    execution_time_ms: u64,
}

impl QueryResult {
    /// Create a result for a row-returning statement.
    pub fn from_rows(
        columns: Vec<ColumnMetadata>,
        rows: Vec<serde_json::Map<String, JsonValue>>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            columns,
            row_count: rows.len() as u64,
            rows,
            rows_affected: None,
            execution_time_ms,
        }
    }

    /// Create an empty result (for statements returning nothing).
    pub fn empty(execution_time_ms: u64) -> Self {
        Self::from_rows(Vec::new(), Vec::new(), execution_time_ms)
    }

    /// Create a result for write operations (INSERT/UPDATE/DELETE).
    pub fn write_result(rows_affected: u64, execution_time_ms: u64) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: rows_affected,
            rows_affected: Some(rows_affected),
            execution_time_ms,
        }
    }

    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    pub fn rows(&self) -> &[serde_json::Map<String, JsonValue>] {
        &self.rows
    }

    /// Rows returned, or rows affected for write operations.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn rows_affected(&self) -> Option<u64> {
        self.rows_affected
    }

    pub fn execution_time_ms(&self) -> u64 {
        self.execution_time_ms
    }

    /// Value of `column` in the first row, if present.
    pub fn first_value(&self, column: &str) -> Option<&JsonValue> {
        self.rows.first().and_then(|row| row.get(column))
    }

    /// Check if the result is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.rows_affected.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_params() {
        let params = vec![
            QueryParam::from(1i64),
            QueryParam::from("it's"),
            QueryParam::Null,
            QueryParam::from(vec![0u8, 1, 2]),
        ];
        assert_eq!(render_params(&params), "[1, 'it''s', NULL, <3 bytes>]");
        assert_eq!(render_params(&[]), "[]");
    }

    #[test]
    fn test_query_param_from_json() {
        let params: Vec<QueryParam> = serde_json::from_str(r#"[1, 2.5, "x", null, true, {"a": 1}]"#)
            .expect("params should parse");
        assert_eq!(params[0], QueryParam::Int(1));
        assert_eq!(params[1], QueryParam::Float(2.5));
        assert_eq!(params[2], QueryParam::String("x".to_string()));
        assert_eq!(params[3], QueryParam::Null);
        assert_eq!(params[4], QueryParam::Bool(true));
        assert!(matches!(params[5], QueryParam::Json(_)));
    }

    #[test]
    fn test_query_param_from_option() {
        assert_eq!(QueryParam::from(None::<i64>), QueryParam::Null);
        assert_eq!(QueryParam::from(Some("a")), QueryParam::String("a".into()));
    }

    #[test]
    fn test_query_result_empty() {
        let result = QueryResult::empty(10);
        assert!(result.is_empty());
        assert_eq!(result.row_count(), 0);
    }

    #[test]
    fn test_query_result_write() {
        let result = QueryResult::write_result(5, 20);
        assert!(!result.is_empty());
        assert_eq!(result.rows_affected(), Some(5));
        assert_eq!(result.row_count(), 5);
    }

    #[test]
    fn test_query_result_rows() {
        let mut row = serde_json::Map::new();
        row.insert("one".to_string(), JsonValue::from(1));
        let result = QueryResult::from_rows(
            vec![ColumnMetadata::new("one", "INTEGER")],
            vec![row],
            3,
        );
        assert_eq!(result.row_count(), 1);
        assert_eq!(result.first_value("one"), Some(&JsonValue::from(1)));
        assert_eq!(result.columns()[0].name, "one");
    }
}
