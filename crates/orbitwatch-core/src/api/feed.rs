//! The fetch seam between the network and the cache.

use std::marker::PhantomData;

use async_trait::async_trait;
use tracing::debug;

use super::{FeedClient, FetchError};
use crate::models::FeedPayload;

/// Performs one outbound request per call and decodes the payload.
///
/// Implementations must not retry and must not touch cache state. Every
/// failure is reported as a `FetchError`.
#[async_trait]
pub trait FeedFetcher<T>: Send + Sync {
    async fn fetch(&self) -> Result<T, FetchError>;
}

/// A `FeedFetcher` for one HTTP endpoint, decoding into `T`.
pub struct HttpFeed<T> {
    client: FeedClient,
    url: String,
    _payload: PhantomData<fn() -> T>,
}

impl<T: FeedPayload> HttpFeed<T> {
    pub fn new(client: FeedClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            _payload: PhantomData,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl<T: FeedPayload> FeedFetcher<T> for HttpFeed<T> {
    async fn fetch(&self) -> Result<T, FetchError> {
        debug!(feed = T::FEED, url = %self.url, "Fetching feed");
        let body = self.client.get_text(&self.url).await?;
        T::decode(&body)
    }
}
