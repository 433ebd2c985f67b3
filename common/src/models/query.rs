//! SQL query models.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

/// One result row: column name to value, in result-set column order.
pub type Row = serde_json::Map<String, Value>;

/// Request body for executing a SQL query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct QueryRequest {
    /// SQL statement, executed verbatim.
    #[validate(
        required(message = "No query provided"),
        length(min = 1, message = "No query provided")
    )]
    pub query: Option<String>,

    /// Positional bind values for `?` / `:N` placeholders.
    ///
    /// Must be a JSON array of scalars. Named parameters (an object) and
    /// `%s` / `%(name)s` placeholders are not supported; an object here is
    /// rejected as `Invalid request format`.
    #[serde(default)]
    #[schema(value_type = Option<Vec<Object>>)]
    pub params: Option<Vec<BindValue>>,
}

/// A scalar bind value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BindValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl BindValue {
    /// Snowflake binding type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            BindValue::Null | BindValue::Text(_) => "TEXT",
            BindValue::Bool(_) => "BOOLEAN",
            BindValue::Integer(_) => "FIXED",
            BindValue::Float(_) => "REAL",
        }
    }

    /// Text form sent on the wire; `None` for SQL NULL.
    pub fn to_wire(&self) -> Option<String> {
        match self {
            BindValue::Null => None,
            BindValue::Bool(b) => Some(b.to_string()),
            BindValue::Integer(i) => Some(i.to_string()),
            BindValue::Float(f) => Some(f.to_string()),
            BindValue::Text(s) => Some(s.clone()),
        }
    }
}
