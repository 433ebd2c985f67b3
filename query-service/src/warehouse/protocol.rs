//! Snowflake REST wire types.
//!
//! Only the fields the service reads are modelled; everything else in the
//! responses is ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use common::models::BindValue;

/// Response codes meaning the query is still running.
pub const QUERY_IN_PROGRESS_CODES: [&str; 2] = ["333333", "333334"];

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub data: LoginRequestData<'a>,
}

#[derive(Debug, Serialize)]
pub struct LoginRequestData<'a> {
    #[serde(rename = "CLIENT_APP_ID")]
    pub client_app_id: &'a str,
    #[serde(rename = "CLIENT_APP_VERSION")]
    pub client_app_version: &'a str,
    #[serde(rename = "ACCOUNT_NAME")]
    pub account_name: &'a str,
    #[serde(rename = "LOGIN_NAME")]
    pub login_name: &'a str,
    #[serde(rename = "PASSWORD")]
    pub password: &'a str,
    #[serde(rename = "AUTHENTICATOR")]
    pub authenticator: &'a str,
    #[serde(rename = "SESSION_PARAMETERS")]
    pub session_parameters: HashMap<&'a str, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub data: Option<LoginResponseData>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponseData {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest<'a> {
    pub sql_text: &'a str,
    pub async_exec: bool,
    pub sequence_id: u64,
    pub query_submission_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bindings: Option<HashMap<String, Binding>>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct Binding {
    #[serde(rename = "type")]
    pub type_: &'static str,
    pub value: Option<String>,
}

/// Converts positional bind values into Snowflake's `"1"`, `"2"`, ... map.
pub fn bindings(params: &[BindValue]) -> Option<HashMap<String, Binding>> {
    if params.is_empty() {
        return None;
    }
    Some(
        params
            .iter()
            .enumerate()
            .map(|(i, p)| {
                (
                    (i + 1).to_string(),
                    Binding {
                        type_: p.type_name(),
                        value: p.to_wire(),
                    },
                )
            })
            .collect(),
    )
}

#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub data: Option<QueryResponseData>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    pub success: bool,
}

impl QueryResponse {
    pub fn in_progress(&self) -> bool {
        self.code
            .as_deref()
            .is_some_and(|c| QUERY_IN_PROGRESS_CODES.contains(&c))
    }

    /// Error text in the `"{code} ({sqlState}): {message}"` form.
    pub fn error_message(&self) -> String {
        let message = self.message.as_deref().unwrap_or("Unknown error");
        let sql_state = self.data.as_ref().and_then(|d| d.sql_state.as_deref());
        match (self.code.as_deref(), sql_state) {
            (Some(code), Some(state)) => format!("{} ({}): {}", code, state, message),
            (Some(code), None) => format!("{}: {}", code, message),
            _ => message.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponseData {
    #[serde(default, rename = "rowtype", alias = "rowType")]
    pub row_type: Option<Vec<RowType>>,
    #[serde(default)]
    pub rowset: Option<Vec<Vec<Value>>>,
    #[serde(default)]
    pub chunks: Option<Vec<Chunk>>,
    #[serde(default)]
    pub chunk_headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub qrmk: Option<String>,
    #[serde(default)]
    pub query_result_format: Option<String>,
    #[serde(default)]
    pub get_result_url: Option<String>,
    #[serde(default)]
    pub query_id: Option<String>,
    #[serde(default)]
    pub sql_state: Option<String>,
}

/// Column metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RowType {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub scale: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub url: String,
    #[serde(default)]
    pub row_count: Option<u64>,
}

/// Parses a result chunk body, which is a bare comma-separated list of row arrays.
pub fn parse_chunk(body: &str) -> serde_json::Result<Vec<Vec<Value>>> {
    let mut wrapped = String::with_capacity(body.len() + 2);
    wrapped.push('[');
    wrapped.push_str(body.trim());
    wrapped.push(']');
    serde_json::from_str(&wrapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_response_parses_rows() {
        let body = json!({
            "data": {
                "rowtype": [
                    {"name": "A", "type": "fixed", "scale": 0, "precision": 38, "nullable": true},
                    {"name": "B", "type": "text", "nullable": true}
                ],
                "rowset": [["1", "x"], ["2", null]],
                "total": 2,
                "queryResultFormat": "json",
                "queryId": "01b2"
            },
            "code": null,
            "message": null,
            "success": true
        });
        let response: QueryResponse = serde_json::from_value(body).unwrap();
        let data = response.data.unwrap();
        let row_type = data.row_type.unwrap();
        assert_eq!(row_type.len(), 2);
        assert_eq!(row_type[0].scale, Some(0));
        assert_eq!(data.rowset.unwrap()[1][1], Value::Null);
        assert_eq!(data.query_result_format.as_deref(), Some("json"));
        assert!(data.chunks.is_none());
    }

    #[test]
    fn test_error_message_format() {
        let body = json!({
            "data": {"sqlState": "42S02"},
            "code": "002003",
            "message": "SQL compilation error: Object 'T' does not exist.",
            "success": false
        });
        let response: QueryResponse = serde_json::from_value(body).unwrap();
        assert_eq!(
            response.error_message(),
            "002003 (42S02): SQL compilation error: Object 'T' does not exist."
        );
        assert!(!response.in_progress());
    }

    #[test]
    fn test_in_progress_code() {
        let body = json!({
            "data": {"getResultUrl": "/queries/01b2/result"},
            "code": "333334",
            "success": true
        });
        let response: QueryResponse = serde_json::from_value(body).unwrap();
        assert!(response.in_progress());
    }

    #[test]
    fn test_parse_chunk() {
        let rows = parse_chunk("[\"3\",\"z\"],\n[\"4\",null]\n").unwrap();
        assert_eq!(rows, vec![vec![json!("3"), json!("z")], vec![json!("4"), Value::Null]]);
    }

    #[test]
    fn test_bindings_are_one_based() {
        let b = bindings(&[BindValue::Text("a".into()), BindValue::Integer(2)]).unwrap();
        assert_eq!(b["1"], Binding { type_: "TEXT", value: Some("a".into()) });
        assert_eq!(b["2"].type_, "FIXED");
        assert!(bindings(&[]).is_none());
    }
}
