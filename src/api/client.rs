//! JSON-over-HTTP transport shared by every collaborator.

#[cfg(test)]
#[path = "client_test.rs"]
mod client_test;

use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::types::{ApiEnvelope, ApiError};
use crate::config::{ClientConfig, HttpTimeouts};

/// Typed stand-in for "no request body".
pub const NO_BODY: Option<&()> = None;

/// Thin wrapper over `reqwest::Client` bound to one API base URL.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client for `base_url` (trailing `/` ignored).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn new(base_url: impl Into<String>, timeouts: HttpTimeouts) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { http, base_url })
    }

    /// Build a client from parsed config.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::new(config.api_url.clone(), config.timeouts)
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Append `path` to the base URL, one percent-encoded segment per
    /// element, then append query pairs. A segment can never add extra path
    /// levels or a query string; empty, `.` and `..` segments are rejected.
    pub(crate) fn url(&self, path: &[&str], query: &[(&str, String)]) -> Result<reqwest::Url, ApiError> {
        if let Some(bad) = path.iter().find(|seg| matches!(**seg, "" | "." | "..")) {
            return Err(ApiError::InvalidRequest(format!("invalid path segment {bad:?}")));
        }
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid base url {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidRequest(format!("base url {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(path);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Send a request and decode the envelope's `data` as `T`.
    ///
    /// # Errors
    ///
    /// See [`ApiError`] variants.
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &[&str],
        query: &[(&str, String)],
        token: Option<&str>,
        body: Option<&(impl Serialize + Sync)>,
    ) -> Result<T, ApiError> {
        let envelope = self.exchange::<T>(method, path, query, token, body).await?;
        envelope
            .data
            .ok_or_else(|| ApiError::Decode(format!("response for /{} has no data", path.join("/"))))
    }

    /// Send a request whose response carries no meaningful data.
    ///
    /// # Errors
    ///
    /// See [`ApiError`] variants.
    pub async fn send_empty(
        &self,
        method: Method,
        path: &[&str],
        token: Option<&str>,
        body: Option<&(impl Serialize + Sync)>,
    ) -> Result<(), ApiError> {
        self.exchange::<serde_json::Value>(method, path, &[], token, body)
            .await
            .map(|_| ())
    }

    async fn exchange<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &[&str],
        query: &[(&str, String)],
        token: Option<&str>,
        body: Option<&(impl Serialize + Sync)>,
    ) -> Result<ApiEnvelope<T>, ApiError> {
        let url = self.url(path, query)?;
        tracing::debug!(%method, %url, authed = token.is_some(), "api request");

        let mut request = self.http.request(method, url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        decode_envelope(status, &text)
    }
}

/// Map a raw HTTP status and body onto the envelope contract.
pub(crate) fn decode_envelope<T: DeserializeOwned>(status: u16, text: &str) -> Result<ApiEnvelope<T>, ApiError> {
    if !(200..300).contains(&status) {
        let (message, code) = match serde_json::from_str::<ApiEnvelope<serde_json::Value>>(text) {
            Ok(env) => (env.message.unwrap_or_else(|| fallback_message(status, text)), env.code),
            Err(_) => (fallback_message(status, text), None),
        };
        return Err(ApiError::Response { status, message, code });
    }

    if text.trim().is_empty() {
        return Ok(ApiEnvelope { success: true, data: None, message: None, code: None });
    }

    let envelope: ApiEnvelope<T> = serde_json::from_str(text).map_err(|e| ApiError::Decode(e.to_string()))?;
    if !envelope.success {
        return Err(ApiError::Response {
            status,
            message: envelope
                .message
                .unwrap_or_else(|| "request was not successful".to_owned()),
            code: envelope.code,
        });
    }
    Ok(envelope)
}

fn fallback_message(status: u16, text: &str) -> String {
    let text = text.trim();
    if text.is_empty() { format!("HTTP {status}") } else { format!("HTTP {status}: {text}") }
}
