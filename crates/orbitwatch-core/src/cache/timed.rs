use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::api::{FeedFetcher, FetchError};

/// A cached value and the time it was fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.fetched_at
    }

    /// True while `now - fetched_at` is strictly below the window.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match chrono::Duration::from_std(window) {
            Ok(window) => self.age(now) < window,
            Err(_) => true,
        }
    }
}

/// Successful outcome of `TimedCache::get_fresh`.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheRead<T> {
    /// Served from a hit or from a fetch that just succeeded
    Fresh { value: T, fetched_at: DateTime<Utc> },
    /// Refetch failed; this is the last good value
    Stale {
        value: T,
        fetched_at: DateTime<Utc>,
        error: FetchError,
    },
}

impl<T> CacheRead<T> {
    pub fn value(&self) -> &T {
        match self {
            CacheRead::Fresh { value, .. } | CacheRead::Stale { value, .. } => value,
        }
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        match self {
            CacheRead::Fresh { fetched_at, .. } | CacheRead::Stale { fetched_at, .. } => *fetched_at,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, CacheRead::Stale { .. })
    }

    /// Short human-readable age of the value, for stale badges.
    pub fn age_display(&self, now: DateTime<Utc>) -> String {
        let seconds = (now - self.fetched_at()).num_seconds();
        if seconds < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if seconds < 60 {
            format!("{}s ago", seconds)
        } else if seconds < 3600 {
            format!("{}m ago", seconds / 60)
        } else {
            let hours = seconds / 3600;
            if (seconds % 3600) / 60 >= 30 {
                // Round up: 1h 30m+ becomes 2h
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        }
    }
}

/// No value has ever been cached and the latest fetch failed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("No value available yet: {source}")]
pub struct ColdStartFailure {
    #[source]
    pub source: FetchError,
}

/// What a `get_fresh` call resolves to.
pub type FeedResult<T> = Result<CacheRead<T>, ColdStartFailure>;

fn fresh_read<T: Clone>(entry: &CacheEntry<T>) -> CacheRead<T> {
    CacheRead::Fresh {
        value: entry.value.clone(),
        fetched_at: entry.fetched_at,
    }
}

fn fall_back<T: Clone>(entry: Option<&CacheEntry<T>>, error: FetchError) -> FeedResult<T> {
    match entry {
        Some(e) => Ok(CacheRead::Stale {
            value: e.value.clone(),
            fetched_at: e.fetched_at,
            error,
        }),
        None => Err(ColdStartFailure { source: error }),
    }
}

/// Stamp for a value fetched at `now`; never older than the entry it replaces.
fn newer_stamp<T>(prev: Option<&CacheEntry<T>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match prev {
        Some(prev) if prev.fetched_at > now => prev.fetched_at,
        _ => now,
    }
}

/// Serves the freshest acceptable value for one feed.
///
/// At most one fetch is in flight per cache. Callers that arrive while a
/// fetch is outstanding wait for it and share its outcome instead of issuing
/// their own request.
pub struct TimedCache<T> {
    name: &'static str,
    fetcher: Arc<dyn FeedFetcher<T>>,
    window: Duration,
    // Held across the fetch; carries the error of the most recent fetch
    gate: Mutex<Option<FetchError>>,
    // Only written while `gate` is held
    entry: RwLock<Option<CacheEntry<T>>>,
    // Bumped after every completed fetch, under the gate
    completed_fetches: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> TimedCache<T> {
    pub fn new(name: &'static str, fetcher: Arc<dyn FeedFetcher<T>>, window: Duration) -> Self {
        Self {
            name,
            fetcher,
            window,
            gate: Mutex::new(None),
            entry: RwLock::new(None),
            completed_fetches: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Current entry, without fetching.
    ///
    /// Does not wait for an in-flight fetch; returns the entry as it was
    /// before that fetch started.
    pub async fn peek(&self) -> Option<CacheEntry<T>> {
        self.entry.read().await.clone()
    }

    /// Return a value no older than the freshness window, fetching if needed.
    ///
    /// - hit: cached value, no network call
    /// - miss + fetch ok: entry replaced with `{value, now}`, returned `Fresh`
    /// - miss + fetch failed + entry present: previous value returned `Stale`
    /// - miss + fetch failed + never populated: `ColdStartFailure`
    pub async fn get_fresh(&self, now: DateTime<Utc>) -> FeedResult<T> {
        let seen = self.completed_fetches.load(Ordering::Acquire);
        let mut last_error = self.gate.lock().await;
        let current = self.entry.read().await.clone();

        if self.completed_fetches.load(Ordering::Acquire) != seen {
            // Outcome of the fetch that completed while this caller waited
            let outcome = match &*last_error {
                Some(error) => Some(fall_back(current.as_ref(), error.clone())),
                None => current.as_ref().map(|e| Ok(fresh_read(e))),
            };
            if let Some(outcome) = outcome {
                debug!(feed = self.name, "Reusing result of concurrent fetch");
                return outcome;
            }
        }

        if let Some(entry) = &current {
            if entry.is_fresh(now, self.window) {
                debug!(
                    feed = self.name,
                    age_ms = entry.age(now).num_milliseconds(),
                    "Serving cached value"
                );
                return Ok(fresh_read(entry));
            }
        }

        debug!(feed = self.name, "Cache miss, fetching");
        let result = match self.fetcher.fetch().await {
            Ok(value) => {
                let fetched_at = newer_stamp(current.as_ref(), now);
                *self.entry.write().await = Some(CacheEntry {
                    value: value.clone(),
                    fetched_at,
                });
                *last_error = None;
                debug!(feed = self.name, "Cache refreshed");
                Ok(CacheRead::Fresh { value, fetched_at })
            }
            Err(error) => {
                warn!(
                    feed = self.name,
                    error = %error,
                    has_fallback = current.is_some(),
                    "Fetch failed"
                );
                *last_error = Some(error.clone());
                fall_back(current.as_ref(), error)
            }
        };

        self.completed_fetches.fetch_add(1, Ordering::Release);
        result
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;
    use crate::api::FetchErrorKind;

    /// Fetcher that replays scripted outcomes and counts calls.
    struct ScriptedFetcher {
        outcomes: StdMutex<VecDeque<Result<u32, FetchError>>>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedFetcher {
        fn new(outcomes: Vec<Result<u32, FetchError>>) -> Arc<Self> {
            Self::with_delay(outcomes, Duration::ZERO)
        }

        fn with_delay(outcomes: Vec<Result<u32, FetchError>>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                outcomes: StdMutex::new(outcomes.into()),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FeedFetcher<u32> for ScriptedFetcher {
        async fn fetch(&self) -> Result<u32, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Network("script exhausted".into())))
        }
    }

    const WINDOW: Duration = Duration::from_millis(1000);

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
    }

    fn cache(fetcher: &Arc<ScriptedFetcher>) -> TimedCache<u32> {
        TimedCache::new("test", fetcher.clone(), WINDOW)
    }

    fn transport() -> FetchError {
        FetchError::Network("connection refused".into())
    }

    #[tokio::test]
    async fn test_miss_fetches_and_stores() {
        let fetcher = ScriptedFetcher::new(vec![Ok(7)]);
        let cache = cache(&fetcher);

        let read = cache.get_fresh(at(0)).await.unwrap();
        assert_eq!(read, CacheRead::Fresh { value: 7, fetched_at: at(0) });
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(
            cache.peek().await,
            Some(CacheEntry { value: 7, fetched_at: at(0) })
        );
    }

    #[tokio::test]
    async fn test_hits_inside_window_issue_no_fetch() {
        let fetcher = ScriptedFetcher::new(vec![Ok(1)]);
        let cache = cache(&fetcher);
        cache.get_fresh(at(0)).await.unwrap();

        for offset in [0, 1, 250, 500, 999] {
            let read = cache.get_fresh(at(offset)).await.unwrap();
            assert_eq!(*read.value(), 1);
            assert!(!read.is_stale());
        }
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_window_boundary_refetches() {
        let fetcher = ScriptedFetcher::new(vec![Ok(1), Ok(2)]);
        let cache = cache(&fetcher);
        cache.get_fresh(at(0)).await.unwrap();

        let read = cache.get_fresh(at(1000)).await.unwrap();
        assert_eq!(*read.value(), 2);
        assert_eq!(read.fetched_at(), at(1000));
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_refetch_serves_stale_value() {
        let fetcher = ScriptedFetcher::new(vec![Ok(1), Err(transport())]);
        let cache = cache(&fetcher);
        cache.get_fresh(at(0)).await.unwrap();

        let read = cache.get_fresh(at(1500)).await.unwrap();
        match read {
            CacheRead::Stale { value, fetched_at, error } => {
                assert_eq!(value, 1);
                assert_eq!(fetched_at, at(0));
                assert_eq!(error.kind(), FetchErrorKind::Transport);
            }
            other => panic!("expected stale read, got {other:?}"),
        }
        // Entry untouched by the failure
        assert_eq!(
            cache.peek().await,
            Some(CacheEntry { value: 1, fetched_at: at(0) })
        );
    }

    #[tokio::test]
    async fn test_stale_entry_is_retried_on_next_call() {
        let fetcher = ScriptedFetcher::new(vec![Ok(1), Err(transport()), Ok(3)]);
        let cache = cache(&fetcher);
        cache.get_fresh(at(0)).await.unwrap();
        assert!(cache.get_fresh(at(1500)).await.unwrap().is_stale());

        let read = cache.get_fresh(at(1600)).await.unwrap();
        assert_eq!(read, CacheRead::Fresh { value: 3, fetched_at: at(1600) });
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test]
    async fn test_cold_start_failure() {
        let fetcher = ScriptedFetcher::new(vec![Err(FetchError::decode("bad payload"))]);
        let cache = cache(&fetcher);

        let err = cache.get_fresh(at(0)).await.unwrap_err();
        assert_eq!(err.source.kind(), FetchErrorKind::Decode);
        assert!(cache.peek().await.is_none());
    }

    #[tokio::test]
    async fn test_recovers_after_cold_start_failure() {
        let fetcher = ScriptedFetcher::new(vec![Err(transport()), Ok(5)]);
        let cache = cache(&fetcher);
        assert!(cache.get_fresh(at(0)).await.is_err());

        let read = cache.get_fresh(at(10)).await.unwrap();
        assert_eq!(*read.value(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_fetch() {
        let fetcher = ScriptedFetcher::with_delay(vec![Ok(9)], Duration::from_millis(100));
        let cache = cache(&fetcher);

        let reads = futures::future::join_all((0..8).map(|i| cache.get_fresh(at(i)))).await;

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 1);
        for read in reads {
            assert_eq!(*read.unwrap().value(), 9);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_share_a_failed_fetch() {
        let fetcher = ScriptedFetcher::with_delay(
            vec![Err(transport()), Ok(2)],
            Duration::from_millis(100),
        );
        let cache = cache(&fetcher);

        let (a, b) = tokio::join!(cache.get_fresh(at(0)), cache.get_fresh(at(0)));

        assert!(a.is_err());
        assert!(b.is_err());
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peek_does_not_wait_for_in_flight_fetch() {
        let fetcher = ScriptedFetcher::with_delay(vec![Ok(1), Ok(2)], Duration::from_secs(10));
        let cache = Arc::new(cache(&fetcher));
        cache.get_fresh(at(0)).await.unwrap();

        let refresh = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get_fresh(at(5000)).await }
        });
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(fetcher.in_flight.load(Ordering::SeqCst), 1);

        let peeked = tokio::time::timeout(Duration::from_millis(1), cache.peek())
            .await
            .expect("peek blocked behind the fetch");
        assert_eq!(peeked, Some(CacheEntry { value: 1, fetched_at: at(0) }));

        let read = refresh.await.unwrap().unwrap();
        assert_eq!(read, CacheRead::Fresh { value: 2, fetched_at: at(5000) });
    }

    #[test]
    fn test_store_keeps_newer_stamp() {
        let prev = CacheEntry { value: 1u32, fetched_at: at(2000) };
        assert_eq!(newer_stamp(Some(&prev), at(1000)), at(2000));
        assert_eq!(newer_stamp(Some(&prev), at(3000)), at(3000));
        assert_eq!(newer_stamp::<u32>(None, at(1000)), at(1000));
    }

    #[test]
    fn test_age_display() {
        let read = CacheRead::Fresh { value: (), fetched_at: at(0) };
        assert_eq!(read.age_display(at(-5000)), "just now");
        assert_eq!(read.age_display(at(500)), "just now");
        assert_eq!(read.age_display(at(12_000)), "12s ago");
        assert_eq!(read.age_display(at(180_000)), "3m ago");
        assert_eq!(read.age_display(at(3_600_000)), "1h ago");
        assert_eq!(read.age_display(at(5_400_000)), "2h ago");
    }
}
