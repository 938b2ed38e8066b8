use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::FeedPayload;
use crate::api::FetchError;

/// Valid latitude range in degrees
const MAX_LATITUDE: f64 = 90.0;

/// Valid longitude range in degrees
const MAX_LONGITUDE: f64 = 180.0;

// Response from the iss-now endpoint. Coordinates arrive as strings.
#[derive(Debug, Deserialize)]
struct IssNowResponse {
    iss_position: IssPosition,
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct IssPosition {
    latitude: String,
    longitude: String,
}

/// Live position of the tracked craft.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PositionRecord {
    pub latitude: f64,
    pub longitude: f64,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub observed_at: DateTime<Utc>,
}

impl PositionRecord {
    /// Build a record, rejecting coordinates outside the valid ranges.
    pub fn new(latitude: f64, longitude: f64, observed_at: DateTime<Utc>) -> Result<Self, FetchError> {
        check_range("latitude", latitude, MAX_LATITUDE)?;
        check_range("longitude", longitude, MAX_LONGITUDE)?;
        Ok(Self {
            latitude,
            longitude,
            observed_at,
        })
    }
}

fn check_range(field: &str, value: f64, limit: f64) -> Result<(), FetchError> {
    if !value.is_finite() || value < -limit || value > limit {
        return Err(FetchError::decode(format!(
            "{} {} outside [-{}, {}]",
            field, value, limit, limit
        )));
    }
    Ok(())
}

fn parse_coordinate(field: &str, raw: &str) -> Result<f64, FetchError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| FetchError::decode(format!("{} {:?} is not a number: {}", field, raw, e)))
}

impl FeedPayload for PositionRecord {
    const FEED: &'static str = "position";

    fn decode(body: &str) -> Result<Self, FetchError> {
        let response: IssNowResponse = serde_json::from_str(body)?;

        let latitude = parse_coordinate("latitude", &response.iss_position.latitude)?;
        let longitude = parse_coordinate("longitude", &response.iss_position.longitude)?;
        let observed_at = DateTime::<Utc>::from_timestamp(response.timestamp, 0).ok_or_else(|| {
            FetchError::decode(format!("timestamp {} out of range", response.timestamp))
        })?;

        Self::new(latitude, longitude, observed_at)
    }
}
