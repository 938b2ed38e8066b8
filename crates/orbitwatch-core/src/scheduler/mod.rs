//! Timer-driven refresh of the feed caches.
//!
//! This module provides the `PollScheduler`, which arms repeating timers,
//! asks the `TimedCache`s for fresh values on every tick, and pushes the
//! results to an `UpdateSink`. The consumer never pulls.
//!
//! The crew cache is refreshed from the position timer by default and is
//! gated by its own, longer freshness window, so it issues far fewer
//! requests. A dedicated crew timer can be configured instead.

pub mod clock;
pub mod poll;
pub mod update;

pub use clock::{Clock, MonotonicClock};
pub use poll::{PollScheduler, ScheduleConfig};
pub use update::{FeedKind, FeedUpdate, UpdateSink};
