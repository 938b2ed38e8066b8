//! Time-bounded caching for feed values.
//!
//! This module provides `TimedCache`, which wraps one `FeedFetcher` with a
//! single value + fetched-at entry and a freshness window. Reads inside the
//! window are served from memory; reads outside it trigger one fetch.
//!
//! A failed refetch never clears a populated entry. The previous value is
//! returned as `CacheRead::Stale` instead, and only a cache that has never
//! been populated reports `ColdStartFailure`.

pub mod timed;

pub use timed::{CacheEntry, CacheRead, ColdStartFailure, FeedResult, TimedCache};
