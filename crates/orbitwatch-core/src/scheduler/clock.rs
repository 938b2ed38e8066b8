use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Source of "now" for freshness decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock anchor advanced by the monotonic tokio clock.
///
/// Freshness arithmetic is unaffected by wall-clock jumps, and under a
/// paused tokio runtime the clock follows virtual time.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    anchor_wall: DateTime<Utc>,
    anchor: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            anchor_wall: Utc::now(),
            anchor: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.anchor.elapsed();
        match chrono::Duration::from_std(elapsed) {
            Ok(elapsed) => self.anchor_wall + elapsed,
            Err(_) => Utc::now(),
        }
    }
}
