//! HTTP client for the feed endpoints.
//!
//! This module provides the `FeedClient` struct. Each call issues exactly one
//! GET request and either returns the response body or a `FetchError`; it
//! never retries. Retry policy belongs to the scheduler's cadence.

use std::time::Duration;

use anyhow::Result;
use reqwest::{header, Client};
use tracing::debug;

use super::FetchError;

/// Default HTTP request timeout in seconds.
/// Feeds answer in well under a second; anything slower is treated as down.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// HTTP client shared by all feeds.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct FeedClient {
    client: Client,
}

impl FeedClient {
    /// Create a new client with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, FetchError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(FetchError::from_status(status, &body))
        }
    }

    /// Fetch a URL and return the raw response body.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let body = response.text().await?;
        debug!(url = url, bytes = body.len(), "Feed response received");
        Ok(body)
    }
}
