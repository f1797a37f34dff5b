use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

use super::team::Team;

/// A club athlete who may need a seat.
#[derive(PartialEq, Eq, Debug, FromRow, Clone, Serialize, Deserialize)]
pub struct Athlete {
    /// Unique athlete ID
    pub id: i64,

    /// First and last name
    pub name: String,

    /// Phone number or other contact
    pub contact: String,

    /// Teams this athlete plays in, ordered by name
    #[sqlx(skip)]
    pub teams: Vec<Team>,
}

impl Athlete {
    pub fn plays_in(&self, team_id: i64) -> bool {
        self.teams.iter().any(|t| t.id == team_id)
    }

    /// Team names joined for display, e.g. `Juniores / Seniores`
    pub fn team_names(&self) -> String {
        self.teams
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<&str>>()
            .join(" / ")
    }
}

/// Fields a staff member fills in to create or edit an athlete.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct AthleteInput {
    pub name: String,
    pub contact: String,
    pub team_ids: Vec<i64>,
}
