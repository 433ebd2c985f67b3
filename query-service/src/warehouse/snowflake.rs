//! Snowflake connection wrapper over the REST session API.
//!
//! A session is opened with a password login, used for one statement and
//! closed again. No pooling and no retries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use common::config::SnowflakeConfig;
use common::errors::{AppError, AppResult};
use common::models::{BindValue, Row};

use super::protocol::{self, LoginRequest, LoginRequestData, LoginResponse, QueryResponse};
use super::value::build_rows;
use super::Warehouse;

const CLIENT_APP_ID: &str = "snowflake-query-service";
const CLIENT_APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// [`Warehouse`] backed by Snowflake. Opens a fresh session per call.
#[derive(Clone)]
pub struct SnowflakeWarehouse {
    config: Arc<SnowflakeConfig>,
    http: reqwest::Client,
}

impl SnowflakeWarehouse {
    pub fn new(config: SnowflakeConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(format!("{}/{}", CLIENT_APP_ID, CLIENT_APP_VERSION))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    /// Opens a new session with the configured credentials.
    pub async fn connect(&self) -> AppResult<SnowflakeSession> {
        SnowflakeSession::connect(&self.config, self.http.clone()).await
    }
}

#[async_trait]
impl Warehouse for SnowflakeWarehouse {
    async fn execute(&self, sql: &str, params: &[BindValue]) -> AppResult<Vec<Row>> {
        let mut session = self.connect().await?;
        let result = session.execute(sql, params).await;
        if let Err(e) = session.close().await {
            tracing::warn!(error = %e, "Failed to close Snowflake session");
        }
        result
    }
}

/// One logged-in Snowflake session.
pub struct SnowflakeSession {
    http: reqwest::Client,
    base_url: String,
    token: String,
    sequence_id: u64,
}

impl SnowflakeSession {
    /// Logs in and returns the session.
    #[tracing::instrument(skip_all, fields(account = %config.account, user = %config.user))]
    pub async fn connect(config: &SnowflakeConfig, http: reqwest::Client) -> AppResult<Self> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        let optional = [
            ("databaseName", &config.database),
            ("schemaName", &config.schema),
            ("warehouse", &config.warehouse),
            ("roleName", &config.role),
        ];
        for (key, value) in optional {
            if let Some(value) = value.as_deref() {
                query.push((key, value));
            }
        }

        let body = LoginRequest {
            data: LoginRequestData {
                client_app_id: CLIENT_APP_ID,
                client_app_version: CLIENT_APP_VERSION,
                account_name: account_name(&config.account),
                login_name: &config.user,
                password: &config.password,
                authenticator: "SNOWFLAKE",
                session_parameters: HashMap::from([(
                    "QUERY_RESULT_FORMAT",
                    Value::String("JSON".to_string()),
                )]),
            },
        };

        let url = format!("{}/session/v1/login-request", config.base_url);
        let response = http
            .post(&url)
            .query(&query)
            .query(&[("request_guid", Uuid::new_v4().to_string())])
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::WarehouseConnection(e.to_string()))?;

        let login: LoginResponse = read_json(response).await?;
        if !login.success {
            let message = login.message.unwrap_or_else(|| "Unknown error".to_string());
            let message = match login.code {
                Some(code) => format!("{}: {}", code, message),
                None => message,
            };
            tracing::error!(error = %message, "Snowflake login failed");
            return Err(AppError::WarehouseAuth(message));
        }

        let token = login
            .data
            .and_then(|d| d.token)
            .ok_or_else(|| AppError::WarehouseProtocol("Login response missing token".into()))?;

        tracing::info!("Successfully connected to Snowflake");
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            token,
            sequence_id: 0,
        })
    }

    /// Runs one statement and returns every row, including those in result chunks.
    #[tracing::instrument(skip(self, params), fields(binds = params.len()))]
    pub async fn execute(&mut self, sql: &str, params: &[BindValue]) -> AppResult<Vec<Row>> {
        self.sequence_id += 1;
        let body = protocol::QueryRequest {
            sql_text: sql,
            async_exec: false,
            sequence_id: self.sequence_id,
            query_submission_time: unix_millis(),
            bindings: protocol::bindings(params),
        };

        let url = format!("{}/queries/v1/query-request", self.base_url);
        let response = self
            .http
            .post(&url)
            .headers(self.auth_headers()?)
            .query(&[("requestId", Uuid::new_v4().to_string())])
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::WarehouseConnection(e.to_string()))?;
        let mut response: QueryResponse = read_json(response).await?;

        while response.in_progress() {
            let result_url = response
                .data
                .as_ref()
                .and_then(|d| d.get_result_url.clone())
                .ok_or_else(|| {
                    AppError::WarehouseProtocol("Query in progress without a result URL".into())
                })?;
            tracing::debug!(result_url = %result_url, "Query still running, polling");
            tokio::time::sleep(POLL_INTERVAL).await;
            response = self.get_json(&format!("{}{}", self.base_url, result_url)).await?;
        }

        if !response.success {
            let message = response.error_message();
            tracing::error!(error = %message, "Error executing query");
            return Err(AppError::WarehouseQuery(message));
        }

        let data = response.data.unwrap_or_default();
        if let Some(format) = data.query_result_format.as_deref() {
            if !format.eq_ignore_ascii_case("json") {
                return Err(AppError::WarehouseProtocol(format!(
                    "Unsupported result format: {}",
                    format
                )));
            }
        }

        let columns = data.row_type.unwrap_or_default();
        let mut rowset = data.rowset.unwrap_or_default();
        let chunks = data.chunks.unwrap_or_default();
        if !chunks.is_empty() {
            let headers = chunk_headers(data.chunk_headers.as_ref(), data.qrmk.as_deref())?;
            for chunk in &chunks {
                rowset.extend(self.fetch_chunk(&chunk.url, &headers).await?);
            }
        }

        tracing::debug!(
            query_id = ?data.query_id,
            rows = rowset.len(),
            chunks = chunks.len(),
            chunk_rows = chunks.iter().filter_map(|c| c.row_count).sum::<u64>(),
            "Query finished"
        );
        Ok(build_rows(&columns, rowset))
    }

    /// Logs the session out.
    pub async fn close(self) -> AppResult<()> {
        let url = format!("{}/session", self.base_url);
        let response = self
            .http
            .post(&url)
            .headers(self.auth_headers()?)
            .query(&[("delete", "true")])
            .query(&[("request_guid", Uuid::new_v4().to_string())])
            .send()
            .await
            .map_err(|e| AppError::WarehouseConnection(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AppError::WarehouseConnection(format!(
                "Logout returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    fn auth_headers(&self) -> AppResult<HeaderMap> {
        let mut headers = HeaderMap::with_capacity(2);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let token = HeaderValue::from_str(&format!("Snowflake Token=\"{}\"", self.token))
            .map_err(|_| AppError::WarehouseProtocol("Session token is not a valid header".into()))?;
        headers.insert(AUTHORIZATION, token);
        Ok(headers)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> AppResult<T> {
        let response = self
            .http
            .get(url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .map_err(|e| AppError::WarehouseConnection(e.to_string()))?;
        read_json(response).await
    }

    async fn fetch_chunk(&self, url: &str, headers: &HeaderMap) -> AppResult<Vec<Vec<Value>>> {
        let response = self
            .http
            .get(url)
            .headers(headers.clone())
            .send()
            .await
            .map_err(|e| AppError::WarehouseConnection(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::WarehouseConnection(format!(
                "Result chunk download returned HTTP {}",
                status
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| AppError::WarehouseConnection(e.to_string()))?;
        protocol::parse_chunk(&body)
            .map_err(|e| AppError::WarehouseProtocol(format!("Malformed result chunk: {}", e)))
    }
}

/// Headers for chunk downloads: the explicit set when given, otherwise the
/// SSE-C headers derived from the result master key.
fn chunk_headers(
    explicit: Option<&HashMap<String, String>>,
    qrmk: Option<&str>,
) -> AppResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    let invalid = |key: &str| AppError::WarehouseProtocol(format!("Invalid chunk header: {}", key));

    match (explicit, qrmk) {
        (Some(explicit), _) if !explicit.is_empty() => {
            for (key, value) in explicit {
                let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| invalid(key.as_str()))?;
                let value = HeaderValue::from_str(value).map_err(|_| invalid(key.as_str()))?;
                headers.insert(name, value);
            }
        }
        (_, Some(qrmk)) => {
            headers.insert(
                "x-amz-server-side-encryption-customer-algorithm",
                HeaderValue::from_static("AES256"),
            );
            let key = "x-amz-server-side-encryption-customer-key";
            headers.insert(key, HeaderValue::from_str(qrmk).map_err(|_| invalid(key))?);
        }
        _ => {}
    }
    Ok(headers)
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> AppResult<T> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| AppError::WarehouseConnection(e.to_string()))?;

    if !status.is_success() {
        let message = format!("Snowflake responded with HTTP {}: {}", status, text);
        return Err(if status.as_u16() == 401 || status.as_u16() == 403 {
            AppError::WarehouseAuth(message)
        } else {
            AppError::WarehouseConnection(message)
        });
    }

    serde_json::from_str(&text)
        .map_err(|e| AppError::WarehouseProtocol(format!("Failed to parse Snowflake response: {}", e)))
}

/// The account locator sent at login is the part before the first dot.
fn account_name(account: &str) -> &str {
    account.split('.').next().unwrap_or(account)
}

fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
