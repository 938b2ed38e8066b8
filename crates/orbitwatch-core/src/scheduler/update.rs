use crate::cache::FeedResult;
use crate::models::{CrewRecord, PositionRecord};

/// Which feed an update belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    Position,
    Crew,
}

impl FeedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::Position => "position",
            FeedKind::Crew => "crew",
        }
    }
}

impl std::fmt::Display for FeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One pushed update. Each carries fresh, stale, or cold-start failure.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedUpdate {
    Position(FeedResult<PositionRecord>),
    Crew(FeedResult<CrewRecord>),
}

impl FeedUpdate {
    pub fn kind(&self) -> FeedKind {
        match self {
            FeedUpdate::Position(_) => FeedKind::Position,
            FeedUpdate::Crew(_) => FeedKind::Crew,
        }
    }

    pub fn is_error(&self) -> bool {
        match self {
            FeedUpdate::Position(r) => r.is_err(),
            FeedUpdate::Crew(r) => r.is_err(),
        }
    }
}

/// Consumer of scheduler updates (the display layer).
///
/// Called from scheduler tasks; implementations should return quickly.
pub trait UpdateSink: Send + Sync {
    fn on_update(&self, update: FeedUpdate);
}

impl<F> UpdateSink for F
where
    F: Fn(FeedUpdate) + Send + Sync,
{
    fn on_update(&self, update: FeedUpdate) {
        self(update)
    }
}
