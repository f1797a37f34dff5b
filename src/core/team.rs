use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

/// A club team (age group) that matches and athletes belong to.
#[derive(PartialEq, Eq, Debug, FromRow, Clone, Serialize, Deserialize)]
pub struct Team {
    /// Unique team ID
    pub id: i64,

    /// Display name, unique across teams
    pub name: String,
}
