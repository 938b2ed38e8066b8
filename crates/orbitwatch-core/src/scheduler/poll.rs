//! Poll scheduler driving the feed caches.
//!
//! # Lifecycle
//!
//! `start()` spawns a driver task that arms the timers. The first tick of a
//! tokio interval completes immediately, which serves as the prime tick: the
//! consumer gets data without waiting a full cadence. Every tick spawns one
//! refresh task per feed, so a slow fetch on one cache never delays the other
//! cache or the next tick deadline. A feed whose previous refresh is still
//! outstanding skips the tick; a stalled fetch delivers one update when it
//! completes, not one per tick it spanned.
//!
//! `stop()` cancels the timers, aborts outstanding refresh tasks and waits for
//! them to finish. Once it returns, the sink is never called again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Clock, FeedUpdate, MonotonicClock, UpdateSink};
use crate::cache::{FeedResult, TimedCache};
use crate::models::{CrewRecord, PositionRecord};

/// Default position timer cadence (a quarter of the 10 second base period).
pub const DEFAULT_POSITION_CADENCE_MS: u64 = 2500;

/// Timer configuration for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// How often the position timer fires
    pub position_cadence: Duration,

    /// Dedicated crew timer. When `None` the crew cache is refreshed on
    /// every position tick, gated by its own freshness window.
    pub crew_cadence: Option<Duration>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            position_cadence: Duration::from_millis(DEFAULT_POSITION_CADENCE_MS),
            crew_cadence: None,
        }
    }
}

impl ScheduleConfig {
    pub fn new(position_cadence: Duration) -> Self {
        Self {
            position_cadence,
            crew_cadence: None,
        }
    }

    /// Give the crew feed its own timer.
    pub fn with_crew_cadence(mut self, cadence: Duration) -> Self {
        self.crew_cadence = Some(cadence);
        self
    }
}

/// Set while a feed has a refresh task outstanding.
#[derive(Clone, Default)]
struct Outstanding(Arc<AtomicBool>);

impl Outstanding {
    fn claim(&self) -> Option<OutstandingGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| OutstandingGuard(self.0.clone()))
    }
}

/// Clears the flag when the refresh task finishes or is aborted.
struct OutstandingGuard(Arc<AtomicBool>);

impl Drop for OutstandingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Everything a refresh task needs. Cheap to clone.
#[derive(Clone)]
struct Feeds {
    position: Arc<TimedCache<PositionRecord>>,
    crew: Arc<TimedCache<CrewRecord>>,
    position_outstanding: Outstanding,
    crew_outstanding: Outstanding,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn UpdateSink>,
}

impl Feeds {
    fn refresh_position(&self, tasks: &mut JoinSet<()>, now: DateTime<Utc>, shutdown: &CancellationToken) {
        spawn_refresh(
            tasks,
            self.position.clone(),
            &self.position_outstanding,
            now,
            shutdown.clone(),
            self.sink.clone(),
            FeedUpdate::Position,
        );
    }

    fn refresh_crew(&self, tasks: &mut JoinSet<()>, now: DateTime<Utc>, shutdown: &CancellationToken) {
        spawn_refresh(
            tasks,
            self.crew.clone(),
            &self.crew_outstanding,
            now,
            shutdown.clone(),
            self.sink.clone(),
            FeedUpdate::Crew,
        );
    }
}

fn spawn_refresh<T>(
    tasks: &mut JoinSet<()>,
    cache: Arc<TimedCache<T>>,
    outstanding: &Outstanding,
    now: DateTime<Utc>,
    shutdown: CancellationToken,
    sink: Arc<dyn UpdateSink>,
    wrap: fn(FeedResult<T>) -> FeedUpdate,
) where
    T: Clone + Send + Sync + 'static,
{
    let Some(guard) = outstanding.claim() else {
        debug!(feed = cache.name(), "Previous refresh still outstanding, skipping tick");
        return;
    };

    tasks.spawn(async move {
        let _guard = guard;
        let result = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            result = cache.get_fresh(now) => result,
        };
        // No await point between this check and delivery
        if shutdown.is_cancelled() {
            debug!(feed = cache.name(), "Dropping result after shutdown");
            return;
        }
        sink.on_update(wrap(result));
    });
}

struct Running {
    shutdown: CancellationToken,
    driver: JoinHandle<()>,
}

/// Periodically refreshes the position and crew caches and pushes the
/// results to an `UpdateSink`.
pub struct PollScheduler {
    feeds: Feeds,
    config: ScheduleConfig,
    running: Option<Running>,
}

impl PollScheduler {
    pub fn new(
        position: Arc<TimedCache<PositionRecord>>,
        crew: Arc<TimedCache<CrewRecord>>,
        config: ScheduleConfig,
        sink: Arc<dyn UpdateSink>,
    ) -> Self {
        Self {
            feeds: Feeds {
                position,
                crew,
                position_outstanding: Outstanding::default(),
                crew_outstanding: Outstanding::default(),
                clock: Arc::new(MonotonicClock::new()),
                sink,
            },
            config,
            running: None,
        }
    }

    /// Replace the clock used to timestamp ticks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.feeds.clock = clock;
        self
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Arm the timers. Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.running.is_some() {
            warn!("Poll scheduler already running");
            return;
        }

        let shutdown = CancellationToken::new();
        let driver = tokio::spawn(run(self.feeds.clone(), self.config.clone(), shutdown.clone()));
        self.running = Some(Running { shutdown, driver });
    }

    /// Cancel all timers and outstanding refreshes.
    ///
    /// Returns once every refresh task has finished; no update is delivered
    /// after that, even if a fetch was in flight.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.shutdown.cancel();
        if let Err(e) = running.driver.await {
            warn!(error = %e, "Poll scheduler driver ended abnormally");
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        // Can't wait here; the driver still aborts its tasks on its own
        if let Some(running) = self.running.take() {
            running.shutdown.cancel();
        }
    }
}

fn timer(period: Duration) -> Interval {
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    timer
}

async fn tick_optional(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn run(feeds: Feeds, config: ScheduleConfig, shutdown: CancellationToken) {
    info!(
        position_cadence_ms = config.position_cadence.as_millis() as u64,
        crew_cadence_ms = config.crew_cadence.map(|c| c.as_millis() as u64),
        position_window_ms = feeds.position.window().as_millis() as u64,
        crew_window_ms = feeds.crew.window().as_millis() as u64,
        "Poll scheduler starting"
    );

    let mut position_timer = timer(config.position_cadence);
    let mut crew_timer = config.crew_cadence.map(timer);
    let crew_follows_position = crew_timer.is_none();
    let mut tasks = JoinSet::new();
    let mut primed = false;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            _ = position_timer.tick() => {
                if !primed {
                    info!("Prime tick");
                    primed = true;
                }
                let now = feeds.clock.now();
                feeds.refresh_position(&mut tasks, now, &shutdown);
                if crew_follows_position {
                    feeds.refresh_crew(&mut tasks, now, &shutdown);
                }
            }

            _ = tick_optional(&mut crew_timer) => {
                let now = feeds.clock.now();
                feeds.refresh_crew(&mut tasks, now, &shutdown);
            }

            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        warn!(error = %e, "Refresh task panicked");
                    }
                }
            }
        }
    }

    debug!(outstanding = tasks.len(), "Aborting refresh tasks");
    tasks.shutdown().await;
    info!("Poll scheduler stopped");
}

// ============================================================================
// Tests
// ============================================================================
