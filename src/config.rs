//! Client configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ErrorCode;

pub const DEFAULT_API_URL: &str = "http://localhost:3001/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SESSION_FILE: &str = ".eventhub/session.json";
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid API URL '{url}': {reason}")]
    InvalidApiUrl { url: String, reason: String },
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidApiUrl { .. } => "E_CONFIG_API_URL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub timeouts: HttpTimeouts,
    /// Upper bound applied by request wrappers around each operation.
    pub operation_timeout: Option<Duration>,
    pub session_file: PathBuf,
    pub page_size: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            timeouts: HttpTimeouts::default(),
            operation_timeout: None,
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `EVENTHUB_API_URL`: backend base URL (default `http://localhost:3001/api`)
    /// - `EVENTHUB_REQUEST_TIMEOUT_SECS`: default 30
    /// - `EVENTHUB_CONNECT_TIMEOUT_SECS`: default 10
    /// - `EVENTHUB_OPERATION_TIMEOUT_SECS`: unset means no wrapper timeout
    /// - `EVENTHUB_SESSION_FILE`: default `.eventhub/session.json`
    /// - `EVENTHUB_PAGE_SIZE`: default 10
    ///
    /// # Errors
    ///
    /// Returns an error if `EVENTHUB_API_URL` is not an absolute http(s) URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = normalize_api_url(
            std::env::var("EVENTHUB_API_URL")
                .ok()
                .as_deref()
                .unwrap_or(DEFAULT_API_URL),
        )?;
        let timeouts = HttpTimeouts {
            request_secs: env_parse("EVENTHUB_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("EVENTHUB_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        let operation_timeout = std::env::var("EVENTHUB_OPERATION_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        let session_file = std::env::var("EVENTHUB_SESSION_FILE")
            .map_or_else(|_| PathBuf::from(DEFAULT_SESSION_FILE), PathBuf::from);
        let page_size = env_parse("EVENTHUB_PAGE_SIZE", DEFAULT_PAGE_SIZE).max(1);

        Ok(Self { api_url, timeouts, operation_timeout, session_file, page_size })
    }
}

/// Validate an API base URL and strip trailing slashes so paths can be appended.
///
/// # Errors
///
/// Returns an error if the URL does not parse or is not http/https.
pub fn normalize_api_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = reqwest::Url::parse(trimmed).map_err(|e| ConfigError::InvalidApiUrl {
        url: raw.to_owned(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_owned()),
        other => Err(ConfigError::InvalidApiUrl {
            url: raw.to_owned(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
