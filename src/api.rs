//! HTTP client for the remote facts API.
//!
//! ERROR HANDLING
//! ==============
//! Transport failures, non-success statuses and undecodable bodies map to
//! distinct [`ApiError`] variants; callers log and degrade rather than retry.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::config::{Timeouts, trim_base_url};
use crate::fact::FactRecord;

/// Path of the facts resource under the API base URL.
pub const FACTS_PATH: &str = "/facts";

/// Errors produced by facts API requests.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The request did not complete.
    #[error("API request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API returned a non-success HTTP status.
    #[error("API response error: status {status}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("API response parse failed: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Thin wrapper that resolves relative URLs against a base and decodes JSON.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns [`ApiError::HttpClientBuild`] if the client cannot be built.
    pub fn new(base_url: &str, timeouts: Timeouts) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self::with_http(http, base_url))
    }

    #[must_use]
    pub fn with_http(http: reqwest::Client, base_url: &str) -> Self {
        Self { http, base_url: trim_base_url(base_url) }
    }

    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Absolute URLs pass through; anything else is appended to the base.
    #[must_use]
    pub fn full_url(&self, url: &str) -> String {
        if url.starts_with("http") { url.to_owned() } else { format!("{}{url}", self.base_url) }
    }

    /// `GET` `url` with optional query pairs and decode the JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn get<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T, ApiError> {
        let resp = self.http.get(self.full_url(url)).query(query).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status { status: status.as_u16(), body });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Facts endpoints.
#[derive(Debug, Clone)]
pub struct FactsApi {
    client: ApiClient,
}

impl FactsApi {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// `GET /facts/random`.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn random(&self) -> Result<FactRecord, ApiError> {
        self.client.get(&format!("{FACTS_PATH}/random"), &[]).await
    }

    /// `GET /facts/search?query=...`.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn search(&self, query: &str) -> Result<Vec<FactRecord>, ApiError> {
        self.client.get(&format!("{FACTS_PATH}/search"), &[("query", query)]).await
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
