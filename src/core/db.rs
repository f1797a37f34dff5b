use std::{collections::BTreeSet, path::Path, str::FromStr};

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    QueryBuilder, Sqlite, SqliteConnection, SqlitePool,
};
use time::Date;

use crate::{
    error::{LedgerError, LedgerResult, RowKind},
    util::{optional, required},
};

use super::{
    athlete::{Athlete, AthleteInput},
    fixture::{Match, MatchInput},
    team::Team,
};

/// Select list shared by every query returning [`Match`] rows.
pub(crate) const MATCH_SELECT: &str = "select m.id, m.name, m.date, m.team_id,
                t.name as team, m.maps_link
            from matches m
            left join teams t on t.id = m.team_id";

const SCHEMA: [&str; 6] = [
    "create table if not exists teams(
            id integer primary key,
            name text not null unique collate nocase
        );",
    "create table if not exists matches(
            id integer primary key,
            name text not null,
            date text not null,
            team_id integer,
            maps_link text,
            foreign key(team_id) references teams(id) on delete set null
        );",
    "create table if not exists athletes(
            id integer primary key,
            name text not null,
            contact text not null
        );",
    "create table if not exists athlete_teams(
            athlete_id integer not null,
            team_id integer not null,
            primary key(athlete_id, team_id),
            foreign key(athlete_id) references athletes(id) on delete cascade,
            foreign key(team_id) references teams(id) on delete cascade
        );",
    "create table if not exists cars(
            id integer primary key,
            match_id integer not null,
            driver text not null,
            contact text not null,
            seats integer not null,
            foreign key(match_id) references matches(id) on delete cascade
        );",
    "create table if not exists assignments(
            id integer primary key,
            match_id integer not null,
            car_id integer not null,
            athlete_id integer not null,
            unique(match_id, athlete_id),
            foreign key(match_id) references matches(id) on delete cascade,
            foreign key(car_id) references cars(id) on delete cascade,
            foreign key(athlete_id) references athletes(id) on delete cascade
        );",
];

/// Handle to the carpool database.
///
/// Every operation runs to completion before returning. Writes spanning more
/// than one statement run inside a single transaction, so a failure leaves no
/// partial effects behind.
pub struct LedgerDb {
    pub(crate) db: SqlitePool,
}

/// Fails with [`LedgerError::NotFound`] unless the row exists.
pub(crate) async fn require_row(
    conn: &mut SqliteConnection,
    kind: RowKind,
    id: i64,
) -> LedgerResult<()> {
    let table = match kind {
        RowKind::Team => "teams",
        RowKind::Match => "matches",
        RowKind::Athlete => "athletes",
        RowKind::Car => "cars",
    };

    let found: bool = sqlx::query_scalar(&format!(
        "select exists(select 1 from {} where id = ?)",
        table
    ))
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    if found {
        Ok(())
    } else {
        Err(LedgerError::not_found(kind, id))
    }
}

fn validate_athlete(input: &AthleteInput) -> LedgerResult<(String, String, BTreeSet<i64>)> {
    let name = required("athlete name", &input.name)?;
    let contact = required("athlete contact", &input.contact)?;
    let teams: BTreeSet<i64> = input.team_ids.iter().copied().collect();

    if teams.is_empty() {
        return Err("an athlete must play in at least one team".into());
    }

    Ok((name, contact, teams))
}

impl LedgerDb {
    /// Opens the database file, creating the file and schema on first use.
    pub async fn open(file: &Path) -> LedgerResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(file)
            .create_if_missing(true)
            .foreign_keys(true);

        let db = SqlitePool::connect_with(options).await?;
        let ledger = LedgerDb { db };
        ledger.create_schema().await?;
        Ok(ledger)
    }

    /// Opens a private in-memory database.
    ///
    /// Every SQLite in-memory connection is its own database, so the pool
    /// is pinned to a single connection that never expires.
    pub async fn in_memory() -> LedgerResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let ledger = LedgerDb { db };
        ledger.create_schema().await?;
        Ok(ledger)
    }

    async fn create_schema(&self) -> LedgerResult<()> {
        log::info!("Ensuring database schema");
        let mut tx = self.db.begin().await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn close(self) {
        self.db.close().await;
    }

    async fn ensure_team_name_free(
        conn: &mut SqliteConnection,
        name: &str,
        except: Option<i64>,
    ) -> LedgerResult<()> {
        let taken: Option<i64> =
            sqlx::query_scalar("select id from teams where name = ? and id != ? limit 1")
                .bind(name)
                .bind(except.unwrap_or(-1))
                .fetch_optional(&mut *conn)
                .await?;

        match taken {
            Some(_) => Err(LedgerError::Validation(format!(
                "a team named '{}' already exists",
                name
            ))),
            None => Ok(()),
        }
    }

    pub async fn add_team(&self, name: &str) -> LedgerResult<Team> {
        let name = required("team name", name)?;
        log::debug!("Creating team {}", name);

        let mut tx = self.db.begin().await?;
        Self::ensure_team_name_free(&mut tx, &name, None).await?;
        let id = sqlx::query("insert into teams(name) values(?)")
            .bind(&name)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();
        tx.commit().await?;

        Ok(Team { id, name })
    }

    /// Renames a team. Matches and athletes refer to teams by id, so they
    /// follow the new name.
    pub async fn rename_team(&self, team_id: i64, name: &str) -> LedgerResult<()> {
        let name = required("team name", name)?;
        log::debug!("Renaming team {} to {}", team_id, name);

        let mut tx = self.db.begin().await?;
        require_row(&mut tx, RowKind::Team, team_id).await?;
        Self::ensure_team_name_free(&mut tx, &name, Some(team_id)).await?;
        sqlx::query("update teams set name = ? where id = ?")
            .bind(&name)
            .bind(team_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Deletes a team. Memberships go with it, its matches stay without a team.
    pub async fn delete_team(&self, team_id: i64) -> LedgerResult<()> {
        log::debug!("Deleting team {}", team_id);
        sqlx::query("delete from teams where id = ?")
            .bind(team_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn fetch_teams(&self) -> LedgerResult<Vec<Team>> {
        Ok(sqlx::query_as("select * from teams order by name, id")
            .fetch_all(&self.db)
            .await?)
    }

    pub async fn fetch_team(&self, team_id: i64) -> LedgerResult<Team> {
        sqlx::query_as("select * from teams where id = ?")
            .bind(team_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(LedgerError::not_found(RowKind::Team, team_id))
    }

    /// Looks a team up by name, ignoring case.
    pub async fn find_team_by_name(&self, name: &str) -> LedgerResult<Option<Team>> {
        Ok(sqlx::query_as("select * from teams where name = ? limit 1")
            .bind(name.trim())
            .fetch_optional(&self.db)
            .await?)
    }

    /// Fills in the team list of each athlete.
    pub(crate) async fn load_teams(&self, athletes: &mut [Athlete]) -> LedgerResult<()> {
        for athlete in athletes.iter_mut() {
            athlete.teams = sqlx::query_as(
                "select t.id, t.name from teams t
                    inner join athlete_teams m on t.id = m.team_id
                    where m.athlete_id = ?
                    order by t.name",
            )
            .bind(athlete.id)
            .fetch_all(&self.db)
            .await?;
        }
        Ok(())
    }

    async fn insert_memberships(
        conn: &mut SqliteConnection,
        athlete_id: i64,
        teams: &BTreeSet<i64>,
    ) -> LedgerResult<()> {
        for team in teams {
            require_row(&mut *conn, RowKind::Team, *team).await?;
            sqlx::query("insert into athlete_teams(athlete_id, team_id) values(?, ?)")
                .bind(athlete_id)
                .bind(team)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    pub async fn add_athlete(&self, input: &AthleteInput) -> LedgerResult<Athlete> {
        let (name, contact, teams) = validate_athlete(input)?;
        log::debug!("Creating athlete {}", name);

        let mut tx = self.db.begin().await?;
        let id = sqlx::query("insert into athletes(name, contact) values(?, ?)")
            .bind(&name)
            .bind(&contact)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();
        Self::insert_memberships(&mut tx, id, &teams).await?;
        tx.commit().await?;

        self.fetch_athlete(id).await
    }

    /// Overwrites an athlete's details and replaces their team memberships.
    pub async fn update_athlete(&self, athlete_id: i64, input: &AthleteInput) -> LedgerResult<()> {
        let (name, contact, teams) = validate_athlete(input)?;
        log::debug!("Updating athlete {}", athlete_id);

        let mut tx = self.db.begin().await?;
        require_row(&mut tx, RowKind::Athlete, athlete_id).await?;
        sqlx::query("update athletes set name = ?, contact = ? where id = ?")
            .bind(&name)
            .bind(&contact)
            .bind(athlete_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("delete from athlete_teams where athlete_id = ?")
            .bind(athlete_id)
            .execute(&mut *tx)
            .await?;
        Self::insert_memberships(&mut tx, athlete_id, &teams).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Deletes an athlete, handing back every seat they held.
    pub async fn delete_athlete(&self, athlete_id: i64) -> LedgerResult<()> {
        log::debug!("Deleting athlete {}", athlete_id);

        let mut tx = self.db.begin().await?;
        sqlx::query(
            "update cars set seats = seats + 1
                where id in (select car_id from assignments where athlete_id = ?)",
        )
        .bind(athlete_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("delete from athletes where id = ?")
            .bind(athlete_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn fetch_athlete(&self, athlete_id: i64) -> LedgerResult<Athlete> {
        let athlete: Athlete = sqlx::query_as("select id, name, contact from athletes where id = ?")
            .bind(athlete_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(LedgerError::not_found(RowKind::Athlete, athlete_id))?;

        let mut athletes = [athlete];
        self.load_teams(&mut athletes).await?;
        let [athlete] = athletes;
        Ok(athlete)
    }

    /// Lists athletes by name. A non-empty `teams` keeps only athletes
    /// playing in at least one of those teams.
    pub async fn fetch_athletes(&self, teams: &[i64]) -> LedgerResult<Vec<Athlete>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("select a.id, a.name, a.contact from athletes a");

        if !teams.is_empty() {
            query.push(" where a.id in (select athlete_id from athlete_teams where team_id in (");
            let mut ids = query.separated(", ");
            for team in teams {
                ids.push_bind(*team);
            }
            ids.push_unseparated("))");
        }
        query.push(" order by a.name, a.id");

        let mut athletes: Vec<Athlete> = query.build_query_as().fetch_all(&self.db).await?;
        self.load_teams(&mut athletes).await?;
        Ok(athletes)
    }

    pub async fn add_match(&self, input: &MatchInput) -> LedgerResult<Match> {
        let name = required("match name", &input.name)?;
        log::debug!("Creating match {} on {}", name, input.date);

        let mut tx = self.db.begin().await?;
        require_row(&mut tx, RowKind::Team, input.team_id).await?;
        let id = sqlx::query("insert into matches(name, date, team_id, maps_link) values(?, ?, ?, ?)")
            .bind(&name)
            .bind(input.date)
            .bind(input.team_id)
            .bind(optional(input.maps_link.as_deref()))
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();
        tx.commit().await?;

        self.fetch_match(id).await
    }

    pub async fn update_match(&self, match_id: i64, input: &MatchInput) -> LedgerResult<()> {
        let name = required("match name", &input.name)?;
        log::debug!("Updating match {}", match_id);

        let mut tx = self.db.begin().await?;
        require_row(&mut tx, RowKind::Match, match_id).await?;
        require_row(&mut tx, RowKind::Team, input.team_id).await?;
        sqlx::query("update matches set name = ?, date = ?, team_id = ?, maps_link = ? where id = ?")
            .bind(&name)
            .bind(input.date)
            .bind(input.team_id)
            .bind(optional(input.maps_link.as_deref()))
            .bind(match_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Deletes a match together with its cars and assignments.
    pub async fn delete_match(&self, match_id: i64) -> LedgerResult<()> {
        log::debug!("Deleting match {}", match_id);
        sqlx::query("delete from matches where id = ?")
            .bind(match_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn fetch_match(&self, match_id: i64) -> LedgerResult<Match> {
        sqlx::query_as(&format!("{} where m.id = ?", MATCH_SELECT))
            .bind(match_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(LedgerError::not_found(RowKind::Match, match_id))
    }

    pub async fn fetch_matches(&self) -> LedgerResult<Vec<Match>> {
        Ok(sqlx::query_as(&format!("{} order by m.date, m.id", MATCH_SELECT))
            .fetch_all(&self.db)
            .await?)
    }

    /// Matches played before `today`, newest first. A non-empty `teams`
    /// keeps only matches of those teams.
    pub async fn fetch_past_matches(&self, teams: &[i64], today: Date) -> LedgerResult<Vec<Match>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(MATCH_SELECT);
        query.push(" where m.date < ").push_bind(today);

        if !teams.is_empty() {
            query.push(" and m.team_id in (");
            let mut ids = query.separated(", ");
            for team in teams {
                ids.push_bind(*team);
            }
            ids.push_unseparated(")");
        }
        query.push(" order by m.date desc, m.id desc");

        Ok(query.build_query_as().fetch_all(&self.db).await?)
    }
}
