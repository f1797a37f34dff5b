use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use time::Date;

use crate::util::{deserialize_date, display_date, serialize_date};

const MAPS_SEARCH_URL: &str = "https://www.google.com/maps/search/?api=1&query=";

/// A scheduled match that needs transport.
#[derive(PartialEq, Eq, Debug, FromRow, Clone, Serialize, Deserialize)]
pub struct Match {
    /// Unique match ID
    pub id: i64,

    /// Match name, usually the opponent or the venue
    pub name: String,

    #[serde(serialize_with = "serialize_date", deserialize_with = "deserialize_date")]
    pub date: Date,

    /// The team playing this match. None once the team is deleted.
    pub team_id: Option<i64>,

    /// Name of the team playing, joined from `teams`
    pub team: Option<String>,

    /// Google Maps link to the venue
    pub maps_link: Option<String>,
}

impl Match {
    /// Returns the stored map link, or a map search for the match name.
    pub fn maps_url(&self) -> String {
        match &self.maps_link {
            Some(link) => link.clone(),
            None => format!(
                "{}{}",
                MAPS_SEARCH_URL,
                url::form_urlencoded::byte_serialize(self.name.as_bytes()).collect::<String>()
            ),
        }
    }

    /// One-line description, e.g. `Benfica (Juniores) - 20/10/2026`
    pub fn headline(&self) -> String {
        match &self.team {
            Some(team) => format!("{} ({}) - {}", self.name, team, display_date(&self.date)),
            None => format!("{} - {}", self.name, display_date(&self.date)),
        }
    }
}

/// Fields a staff member fills in to create or edit a match.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct MatchInput {
    pub name: String,

    #[serde(serialize_with = "serialize_date", deserialize_with = "deserialize_date")]
    pub date: Date,

    pub team_id: i64,

    pub maps_link: Option<String>,
}
