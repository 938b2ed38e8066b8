use serde::{Deserialize, Serialize};

use super::FeedPayload;
use crate::api::FetchError;

// Response from the astros endpoint
#[derive(Debug, Deserialize)]
struct AstrosResponse {
    number: u32,
    people: Vec<AstroPerson>,
}

#[derive(Debug, Deserialize)]
struct AstroPerson {
    name: String,
    craft: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CrewMember {
    pub name: String,
    pub craft: String,
}

/// Roster of people currently in orbit.
///
/// `count()` always equals `members().len()`; a payload whose reported
/// number disagrees with its list is rejected at decode time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CrewRecord {
    count: u32,
    members: Vec<CrewMember>,
}

impl CrewRecord {
    pub fn new(members: Vec<CrewMember>) -> Self {
        Self {
            count: members.len() as u32,
            members,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn members(&self) -> &[CrewMember] {
        &self.members
    }
}

impl FeedPayload for CrewRecord {
    const FEED: &'static str = "crew";

    fn decode(body: &str) -> Result<Self, FetchError> {
        let response: AstrosResponse = serde_json::from_str(body)?;

        if response.people.len() != response.number as usize {
            return Err(FetchError::decode(format!(
                "crew count {} does not match {} listed members",
                response.number,
                response.people.len()
            )));
        }

        let members = response
            .people
            .into_iter()
            .map(|p| CrewMember {
                name: p.name,
                craft: p.craft,
            })
            .collect();

        Ok(Self::new(members))
    }
}
