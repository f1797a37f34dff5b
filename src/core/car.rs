use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

use super::athlete::Athlete;

/// A car offered for one match.
#[derive(PartialEq, Eq, Debug, FromRow, Clone, Serialize, Deserialize)]
pub struct Car {
    /// Unique car ID
    pub id: i64,

    /// The match this car drives to
    pub match_id: i64,

    pub driver: String,

    /// Driver's contact
    pub contact: String,

    /// Remaining free seats. Decremented on every assignment.
    pub seats: i64,
}

impl Car {
    pub fn has_free_seat(&self) -> bool {
        self.seats > 0
    }
}

/// A binding of one athlete to one car for one match.
#[derive(PartialEq, Eq, Debug, FromRow, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: i64,
    pub match_id: i64,
    pub car_id: i64,
    pub athlete_id: i64,
}

/// A car together with the athletes riding in it.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct CarPassengers {
    pub car: Car,
    pub passengers: Vec<Athlete>,
}
