//! Core library for orbitwatch.
//!
//! Polls a position feed and a crew feed for a moving spacecraft, keeps each
//! response in a [`TimedCache`] with its own freshness window, and pushes the
//! latest values to a consumer on a fixed cadence through the
//! [`PollScheduler`].
//!
//! - [`api`]: HTTP feed client and the [`FeedFetcher`] seam
//! - [`models`]: typed feed records and their payload decoders
//! - [`cache`]: time-bounded, stale-on-error cache
//! - [`scheduler`]: timer-driven refresh loop and consumer interface
//! - [`config`]: startup configuration

pub mod api;
pub mod cache;
pub mod config;
pub mod models;
pub mod scheduler;

pub use api::{FeedClient, FeedFetcher, FetchError, FetchErrorKind, HttpFeed};
pub use cache::{CacheEntry, CacheRead, ColdStartFailure, FeedResult, TimedCache};
pub use config::{FeedConfig, IgnoredSetting};
pub use models::{CrewMember, CrewRecord, FeedPayload, PositionRecord};
pub use scheduler::{
    Clock, FeedKind, FeedUpdate, MonotonicClock, PollScheduler, ScheduleConfig, UpdateSink,
};
