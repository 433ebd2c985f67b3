//! Service configuration.
//!
//! Loaded once at startup from the process environment (and a `.env` file when
//! present, see [`load_dotenv`]). Immutable afterwards.

use std::fmt;
use std::time::Duration;

use crate::errors::{AppError, AppResult};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Service name used in logs.
    pub service_name: String,

    /// Listen address.
    pub host: String,

    /// Listen port.
    pub port: u16,

    /// Debug mode lowers the default log level to `debug`.
    pub debug: bool,

    /// Emit logs as JSON lines instead of human-readable text.
    pub json_logs: bool,

    /// Warehouse connection parameters.
    pub snowflake: SnowflakeConfig,
}

/// Snowflake connection parameters.
#[derive(Clone)]
pub struct SnowflakeConfig {
    /// Account identifier, e.g. `xy12345.eu-central-1`.
    pub account: String,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub warehouse: Option<String>,
    pub role: Option<String>,
    /// Base URL of the Snowflake REST endpoint, without trailing slash.
    pub base_url: String,
    /// Timeout applied to every outbound HTTP call.
    pub request_timeout: Duration,
}

// The password must never reach the logs.
impl fmt::Debug for SnowflakeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeConfig")
            .field("account", &self.account)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("warehouse", &self.warehouse)
            .field("role", &self.role)
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl AppConfig {
    /// Loads configuration for the named service from the environment.
    ///
    /// Call [`load_dotenv`] first for `.env` support.
    pub fn load_with_service(service_name: &str) -> AppResult<Self> {
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(service_name: &str, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &str| {
            get(key).ok_or_else(|| AppError::Config(format!("{} is not set", key)))
        };

        let account = require("SNOWFLAKE_ACCOUNT")?;
        let base_url = get("SNOWFLAKE_HOST")
            .map(|h| normalize_base_url(&h))
            .unwrap_or_else(|| format!("https://{}.snowflakecomputing.com", account));

        let request_timeout = match get("SNOWFLAKE_REQUEST_TIMEOUT_SECS") {
            Some(v) => v.parse::<u64>().map_err(|_| {
                AppError::Config(format!("SNOWFLAKE_REQUEST_TIMEOUT_SECS is not a number: {}", v))
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        let snowflake = SnowflakeConfig {
            user: require("SNOWFLAKE_USER")?,
            password: require("SNOWFLAKE_PASSWORD")?,
            database: get("SNOWFLAKE_DATABASE"),
            schema: get("SNOWFLAKE_SCHEMA"),
            warehouse: get("SNOWFLAKE_WAREHOUSE"),
            role: get("SNOWFLAKE_ROLE"),
            account,
            base_url,
            request_timeout: Duration::from_secs(request_timeout),
        };

        let port = match get("PORT") {
            Some(v) => v
                .parse::<u16>()
                .map_err(|_| AppError::Config(format!("PORT is not a valid port: {}", v)))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            service_name: service_name.to_string(),
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            debug: get("DEBUG").map(|v| parse_flag(&v)).unwrap_or(false),
            json_logs: get("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
            snowflake,
        })
    }

    /// `host:port` string for binding the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reads a `.env` file from the working directory into the environment.
///
/// Variables already set take precedence. A missing file is not an error; any
/// other failure is returned so it can be logged once tracing is up.
pub fn load_dotenv() -> Option<dotenvy::Error> {
    dotenv_failure(dotenvy::dotenv())
}

fn dotenv_failure<T>(result: Result<T, dotenvy::Error>) -> Option<dotenvy::Error> {
    match result {
        Err(e) if !e.not_found() => Some(e),
        _ => None,
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "t")
}

/// Accepts either a bare host name or a full URL.
fn normalize_base_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}
