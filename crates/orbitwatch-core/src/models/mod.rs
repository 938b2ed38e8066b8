//! Data models for the position and crew feeds.
//!
//! Each feed has a private wire struct that mirrors the JSON payload and a
//! public record type handed to consumers:
//!
//! - `PositionRecord`: latitude, longitude and observation time
//! - `CrewRecord`, `CrewMember`: the roster of people in orbit
//!
//! Decoding is strict. A payload that does not satisfy the record's
//! invariants is a `FetchError::Decode`, never a partially filled record.

pub mod crew;
pub mod position;

pub use crew::{CrewMember, CrewRecord};
pub use position::PositionRecord;

use crate::api::FetchError;

/// A record that can be decoded from one feed response body.
pub trait FeedPayload: Sized + Clone + Send + Sync + 'static {
    /// Short feed name used in logs
    const FEED: &'static str;

    fn decode(body: &str) -> Result<Self, FetchError>;
}
