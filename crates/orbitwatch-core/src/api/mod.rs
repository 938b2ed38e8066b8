//! Feed client module for the open-notify style position and crew services.
//!
//! This module provides the `FeedClient` for issuing single, unauthenticated
//! GET requests, and the `FeedFetcher` trait that the cache layer depends on.
//! `HttpFeed` joins the two: one endpoint plus one payload decoder.

pub mod client;
pub mod error;
pub mod feed;

pub use client::FeedClient;
pub use error::{FetchError, FetchErrorKind};
pub use feed::{FeedFetcher, HttpFeed};
