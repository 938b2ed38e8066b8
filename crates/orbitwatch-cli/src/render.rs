//! Formatting of pushed updates for the terminal.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use orbitwatch_core::{
    CacheRead, Clock, CrewRecord, FeedResult, FeedUpdate, PositionRecord, UpdateSink,
};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn render(update: &FeedUpdate, now: DateTime<Utc>, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => text(update, now),
        OutputFormat::Json => json_line(update, now).to_string(),
    }
}

/// Prints each update as one line on stdout.
///
/// Ages are measured with the same clock that stamps cache entries.
pub struct PrintSink {
    clock: Arc<dyn Clock>,
    format: OutputFormat,
}

impl PrintSink {
    pub fn new(clock: Arc<dyn Clock>, format: OutputFormat) -> Self {
        Self { clock, format }
    }

    fn line(&self, update: &FeedUpdate) -> String {
        render(update, self.clock.now(), self.format)
    }
}

impl UpdateSink for PrintSink {
    fn on_update(&self, update: FeedUpdate) {
        println!("{}", self.line(&update));
    }
}

fn status_label<T>(result: &FeedResult<T>, now: DateTime<Utc>) -> String {
    match result {
        Ok(read @ CacheRead::Stale { .. }) => format!("stale ({})", read.age_display(now)),
        Ok(CacheRead::Fresh { .. }) => "fresh".to_string(),
        Err(_) => "unavailable".to_string(),
    }
}

fn position_text(position: &PositionRecord) -> String {
    format!(
        "{:.4},{:.4} @ {}",
        position.latitude,
        position.longitude,
        position.observed_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

fn crew_text(crew: &CrewRecord) -> String {
    let names: Vec<String> = crew
        .members()
        .iter()
        .map(|m| format!("{} ({})", m.name, m.craft))
        .collect();
    if names.is_empty() {
        format!("{} aboard", crew.count())
    } else {
        format!("{} aboard: {}", crew.count(), names.join(", "))
    }
}

fn text(update: &FeedUpdate, now: DateTime<Utc>) -> String {
    let kind = update.kind();
    match update {
        FeedUpdate::Position(result) => match result {
            Ok(read) => format!("{} {} {}", kind, status_label(result, now), position_text(read.value())),
            Err(e) => format!("{} unavailable: {}", kind, e),
        },
        FeedUpdate::Crew(result) => match result {
            Ok(read) => format!("{} {} {}", kind, status_label(result, now), crew_text(read.value())),
            Err(e) => format!("{} unavailable: {}", kind, e),
        },
    }
}

fn result_json<T: serde::Serialize>(result: &FeedResult<T>, now: DateTime<Utc>) -> Value {
    match result {
        Ok(CacheRead::Fresh { value, fetched_at }) => json!({
            "status": "fresh",
            "fetchedAt": fetched_at,
            "value": value,
        }),
        Ok(read @ CacheRead::Stale { value, fetched_at, error }) => json!({
            "status": "stale",
            "fetchedAt": fetched_at,
            "age": read.age_display(now),
            "error": error.to_string(),
            "value": value,
        }),
        Err(e) => json!({
            "status": "unavailable",
            "errorKind": e.source.kind().to_string(),
            "error": e.to_string(),
        }),
    }
}

fn json_line(update: &FeedUpdate, now: DateTime<Utc>) -> Value {
    let mut body = match update {
        FeedUpdate::Position(result) => result_json(result, now),
        FeedUpdate::Crew(result) => result_json(result, now),
    };
    body["feed"] = json!(update.kind().as_str());
    body
}
