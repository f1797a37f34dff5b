use std::{fmt::Write, path::PathBuf};

use anyhow::anyhow;
use clap::Subcommand;
use serde::Serialize;
use time::Date;

use crate::{
    core::{
        athlete::{Athlete, AthleteInput},
        car::{Car, CarPassengers},
        db::LedgerDb,
        fixture::{Match, MatchInput},
        settings::Settings,
        team::Team,
    },
    util::{display_date, parse_date, today},
};

#[derive(Subcommand, Debug, PartialEq)]
pub enum RunType {
    /// Create the database file and schema if they do not exist.
    Init,

    /// Manage club teams.
    Team {
        #[command(subcommand)]
        action: TeamAction,
    },

    /// Manage athletes and their teams.
    Athlete {
        #[command(subcommand)]
        action: AthleteAction,
    },

    /// Manage matches.
    Match {
        #[command(subcommand)]
        action: MatchAction,
    },

    /// Manage the cars offered for a match.
    Car {
        #[command(subcommand)]
        action: CarAction,
    },

    /// Seat an athlete in a car, moving them out of any other car for that match.
    Assign {
        match_id: i64,
        car_id: i64,
        athlete_id: i64,
    },

    /// Free an athlete's seat in a car.
    Unassign { car_id: i64, athlete_id: i64 },

    /// List athletes without a seat and cars with free seats for a match.
    Available {
        match_id: i64,

        /// Only list athletes of this team. Defaults to the settings' team.
        #[arg(short, long)]
        team: Option<String>,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum TeamAction {
    Add { name: String },
    Rename { id: i64, name: String },
    Delete { id: i64 },
    List,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum AthleteAction {
    Add {
        name: String,
        contact: String,

        /// Team names, repeat or comma-separate for several.
        #[arg(short, long = "team", required = true, value_delimiter = ',')]
        teams: Vec<String>,
    },
    Update {
        id: i64,
        name: String,
        contact: String,

        #[arg(short, long = "team", required = true, value_delimiter = ',')]
        teams: Vec<String>,
    },
    Delete {
        id: i64,
    },
    List {
        /// Only list athletes playing in any of these teams.
        #[arg(short, long = "team", value_delimiter = ',')]
        teams: Vec<String>,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum MatchAction {
    Add {
        name: String,

        /// Match day as YYYY-MM-DD.
        #[arg(value_parser = parse_date)]
        date: Date,

        #[arg(short, long)]
        team: String,

        /// Google Maps link to the venue.
        #[arg(short, long)]
        maps_link: Option<String>,
    },
    Update {
        id: i64,
        name: String,

        #[arg(value_parser = parse_date)]
        date: Date,

        #[arg(short, long)]
        team: String,

        #[arg(short, long)]
        maps_link: Option<String>,
    },
    Delete {
        id: i64,
    },
    List,

    /// Matches already played, newest first, with their carpools.
    Past {
        #[arg(short, long = "team", value_delimiter = ',')]
        teams: Vec<String>,
    },

    /// The next match and its carpool.
    Next {
        #[arg(short, long)]
        team: Option<String>,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum CarAction {
    Add {
        match_id: i64,
        driver: String,
        contact: String,
        seats: i64,
    },
    Update {
        id: i64,
        driver: String,
        contact: String,
        seats: i64,
    },
    Delete {
        id: i64,
    },

    /// Show every car of a match with its passengers.
    List {
        match_id: i64,
    },
}

/// Everything a command needs, passed explicitly to each call.
pub struct Context {
    pub db: LedgerDb,
    pub settings: Settings,
    pub database: PathBuf,
    pub json: bool,
}

#[derive(Serialize)]
struct Availability {
    athletes: Vec<Athlete>,
    cars: Vec<Car>,
}

#[derive(Serialize)]
struct MatchCarpool {
    #[serde(rename = "match")]
    game: Match,
    maps_url: String,
    cars: Vec<CarPassengers>,
}

fn render_teams(teams: &[Team]) -> String {
    if teams.is_empty() {
        return "No teams found.".to_owned();
    }
    teams
        .iter()
        .map(|t| format!("{}\t{}", t.id, t.name))
        .collect::<Vec<String>>()
        .join("\n")
}

fn render_athletes(athletes: &[Athlete]) -> String {
    if athletes.is_empty() {
        return "No athletes found.".to_owned();
    }
    athletes
        .iter()
        .map(|a| format!("{}\t{} - {} - {}", a.id, a.name, a.contact, a.team_names()))
        .collect::<Vec<String>>()
        .join("\n")
}

fn render_cars(cars: &[Car]) -> String {
    if cars.is_empty() {
        return "No cars with free seats.".to_owned();
    }
    cars.iter()
        .map(|c| format!("{}\t{} ({}) - {} free seats", c.id, c.driver, c.contact, c.seats))
        .collect::<Vec<String>>()
        .join("\n")
}

fn render_carpool(carpool: &MatchCarpool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", carpool.game.headline());
    let _ = writeln!(out, "Map: {}", carpool.maps_url);

    if carpool.cars.is_empty() {
        out.push_str("No cars for this match.");
        return out;
    }

    for entry in &carpool.cars {
        let car = &entry.car;
        let _ = write!(
            out,
            "\nCar {}: {} ({}) - {} free seats",
            car.id, car.driver, car.contact, car.seats
        );
        for athlete in &entry.passengers {
            let _ = write!(out, "\n  - {} ({})", athlete.name, athlete.contact);
        }
    }
    out
}

impl Context {
    fn output<T: Serialize>(&self, value: &T, text: impl FnOnce(&T) -> String) -> anyhow::Result<String> {
        if self.json {
            Ok(serde_json::to_string_pretty(value)?)
        } else {
            Ok(text(value))
        }
    }

    async fn team_id(&self, name: &str) -> anyhow::Result<i64> {
        self.db
            .find_team_by_name(name)
            .await?
            .map(|t| t.id)
            .ok_or_else(|| anyhow!("Unknown team {}", name))
    }

    async fn team_ids(&self, names: &[String]) -> anyhow::Result<Vec<i64>> {
        let mut ids = vec![];
        for name in names {
            ids.push(self.team_id(name).await?);
        }
        Ok(ids)
    }

    /// Resolves an optional team name, falling back to the configured team.
    async fn team_or_default(&self, team: Option<String>) -> anyhow::Result<Option<i64>> {
        match team.or_else(|| self.settings.default_team.clone()) {
            Some(name) => Ok(Some(self.team_id(&name).await?)),
            None => Ok(None),
        }
    }

    async fn carpool(&self, game: Match) -> anyhow::Result<MatchCarpool> {
        let cars = self.db.fetch_carpool(game.id).await?;
        Ok(MatchCarpool {
            maps_url: game.maps_url(),
            game,
            cars,
        })
    }

    async fn run_team(&self, action: TeamAction) -> anyhow::Result<String> {
        match action {
            TeamAction::Add { name } => {
                let team = self.db.add_team(&name).await?;
                self.output(&team, |t| format!("Added team {} ({})", t.id, t.name))
            }
            TeamAction::Rename { id, name } => {
                self.db.rename_team(id, &name).await?;
                Ok(format!("Renamed team {}", id))
            }
            TeamAction::Delete { id } => {
                self.db.delete_team(id).await?;
                Ok(format!("Deleted team {}", id))
            }
            TeamAction::List => {
                let teams = self.db.fetch_teams().await?;
                self.output(&teams, |t| render_teams(t))
            }
        }
    }

    async fn run_athlete(&self, action: AthleteAction) -> anyhow::Result<String> {
        match action {
            AthleteAction::Add {
                name,
                contact,
                teams,
            } => {
                let input = AthleteInput {
                    name,
                    contact,
                    team_ids: self.team_ids(&teams).await?,
                };
                let athlete = self.db.add_athlete(&input).await?;
                self.output(&athlete, |a| format!("Added athlete {} ({})", a.id, a.name))
            }
            AthleteAction::Update {
                id,
                name,
                contact,
                teams,
            } => {
                let input = AthleteInput {
                    name,
                    contact,
                    team_ids: self.team_ids(&teams).await?,
                };
                self.db.update_athlete(id, &input).await?;
                Ok(format!("Updated athlete {}", id))
            }
            AthleteAction::Delete { id } => {
                self.db.delete_athlete(id).await?;
                Ok(format!("Deleted athlete {}", id))
            }
            AthleteAction::List { teams } => {
                let team_ids = self.team_ids(&teams).await?;
                let athletes = self.db.fetch_athletes(&team_ids).await?;
                self.output(&athletes, |a| render_athletes(a))
            }
        }
    }

    async fn run_match(&self, action: MatchAction) -> anyhow::Result<String> {
        match action {
            MatchAction::Add {
                name,
                date,
                team,
                maps_link,
            } => {
                let input = MatchInput {
                    name,
                    date,
                    team_id: self.team_id(&team).await?,
                    maps_link,
                };
                let game = self.db.add_match(&input).await?;
                self.output(&game, |m| format!("Added match {} ({})", m.id, m.headline()))
            }
            MatchAction::Update {
                id,
                name,
                date,
                team,
                maps_link,
            } => {
                let input = MatchInput {
                    name,
                    date,
                    team_id: self.team_id(&team).await?,
                    maps_link,
                };
                self.db.update_match(id, &input).await?;
                Ok(format!("Updated match {}", id))
            }
            MatchAction::Delete { id } => {
                self.db.delete_match(id).await?;
                Ok(format!("Deleted match {}", id))
            }
            MatchAction::List => {
                let matches = self.db.fetch_matches().await?;
                self.output(&matches, |matches| {
                    if matches.is_empty() {
                        return "No matches found.".to_owned();
                    }
                    matches
                        .iter()
                        .map(|m| format!("{}\t{}\t{}", m.id, m.headline(), m.maps_url()))
                        .collect::<Vec<String>>()
                        .join("\n")
                })
            }
            MatchAction::Past { teams } => {
                let team_ids = self.team_ids(&teams).await?;
                let mut carpools = vec![];
                for game in self.db.fetch_past_matches(&team_ids, today()).await? {
                    carpools.push(self.carpool(game).await?);
                }
                self.output(&carpools, |carpools| {
                    if carpools.is_empty() {
                        return "No past matches found.".to_owned();
                    }
                    carpools
                        .iter()
                        .map(render_carpool)
                        .collect::<Vec<String>>()
                        .join("\n\n")
                })
            }
            MatchAction::Next { team } => {
                let team_id = self.team_or_default(team).await?;
                match self.db.fetch_next_match(team_id).await? {
                    Some(game) => {
                        let carpool = self.carpool(game).await?;
                        self.output(&carpool, render_carpool)
                    }
                    None => self.output(&Option::<MatchCarpool>::None, |_| {
                        "No upcoming matches found.".to_owned()
                    }),
                }
            }
        }
    }

    async fn run_car(&self, action: CarAction) -> anyhow::Result<String> {
        match action {
            CarAction::Add {
                match_id,
                driver,
                contact,
                seats,
            } => {
                let car = self.db.add_car(match_id, &driver, &contact, seats).await?;
                self.output(&car, |c| format!("Added car {} ({})", c.id, c.driver))
            }
            CarAction::Update {
                id,
                driver,
                contact,
                seats,
            } => {
                self.db.update_car(id, &driver, &contact, seats).await?;
                Ok(format!("Updated car {}", id))
            }
            CarAction::Delete { id } => {
                self.db.delete_car(id).await?;
                Ok(format!("Deleted car {}", id))
            }
            CarAction::List { match_id } => {
                let game = self.db.fetch_match(match_id).await?;
                let carpool = self.carpool(game).await?;
                self.output(&carpool, render_carpool)
            }
        }
    }
}

pub async fn run_command(ctx: &Context, command: RunType) -> anyhow::Result<String> {
    match command {
        RunType::Init => Ok(format!("Database ready at {}", ctx.database.display())),
        RunType::Team { action } => ctx.run_team(action).await,
        RunType::Athlete { action } => ctx.run_athlete(action).await,
        RunType::Match { action } => ctx.run_match(action).await,
        RunType::Car { action } => ctx.run_car(action).await,
        RunType::Assign {
            match_id,
            car_id,
            athlete_id,
        } => {
            ctx.db.assign_athlete(match_id, car_id, athlete_id).await?;
            Ok(format!("Athlete {} assigned to car {}", athlete_id, car_id))
        }
        RunType::Unassign { car_id, athlete_id } => {
            ctx.db.remove_athlete(car_id, athlete_id).await?;
            Ok(format!("Athlete {} removed from car {}", athlete_id, car_id))
        }
        RunType::Available { match_id, team } => {
            let game = ctx.db.fetch_match(match_id).await?;
            let team_id = ctx.team_or_default(team).await?;
            let availability = Availability {
                athletes: ctx.db.fetch_available_athletes(game.id, team_id).await?,
                cars: ctx.db.fetch_available_cars(game.id).await?,
            };
            ctx.output(&availability, |a| {
                format!(
                    "{} on {}\n\nAthletes without a seat:\n{}\n\nCars with free seats:\n{}",
                    game.name,
                    display_date(&game.date),
                    render_athletes(&a.athletes),
                    render_cars(&a.cars)
                )
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::Args;

    async fn context(json: bool) -> Context {
        Context {
            db: LedgerDb::in_memory().await.unwrap(),
            settings: Settings::default(),
            database: PathBuf::from(":memory:"),
            json,
        }
    }

    async fn run(ctx: &Context, line: &str) -> anyhow::Result<String> {
        let args = Args::try_parse_from(
            std::iter::once("andeboleias").chain(line.split_whitespace()),
        )?;
        run_command(ctx, args.command).await
    }

    #[tokio::test]
    async fn test_carpool_flow() {
        let ctx = context(false).await;
        let next_week = (today() + time::Duration::days(7)).to_string();

        assert_eq!(run(&ctx, "team add Seniores").await.unwrap(), "Added team 1 (Seniores)");
        run(&ctx, "team add Juniores").await.unwrap();
        assert_eq!(
            run(&ctx, "athlete add Ana 911 --team seniores,Juniores").await.unwrap(),
            "Added athlete 1 (Ana)"
        );
        run(&ctx, "athlete add Bruno 912 -t Juniores").await.unwrap();
        run(&ctx, &format!("match add Pavilhão {} -t Seniores", next_week))
            .await
            .unwrap();
        assert_eq!(run(&ctx, "car add 1 Rui 96 1").await.unwrap(), "Added car 1 (Rui)");

        run(&ctx, "assign 1 1 1").await.unwrap();
        assert!(run(&ctx, "assign 1 1 2").await.is_err());

        let next = run(&ctx, "match next -t Seniores").await.unwrap();
        assert!(next.contains("Pavilhão (Seniores)"));
        assert!(next.contains("Car 1: Rui (96) - 0 free seats"));
        assert!(next.contains("  - Ana (911)"));

        let available = run(&ctx, "available 1").await.unwrap();
        assert!(available.contains("2\tBruno - 912 - Juniores"));
        assert!(available.contains("No cars with free seats."));

        run(&ctx, "unassign 1 1").await.unwrap();
        let available = run(&ctx, "available 1 --team Seniores").await.unwrap();
        assert!(available.contains("1\tAna - 911 - Juniores / Seniores"));
        assert!(!available.contains("Bruno"));
        assert!(available.contains("1\tRui (96) - 1 free seats"));
    }

    #[tokio::test]
    async fn test_unknown_team() {
        let ctx = context(false).await;
        let err = run(&ctx, "athlete add Ana 911 --team Minis").await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown team Minis");
        assert_eq!(run(&ctx, "match next").await.unwrap(), "No upcoming matches found.");
    }

    #[tokio::test]
    async fn test_json_output() {
        let ctx = context(true).await;
        run(&ctx, "team add Seniores").await.unwrap();
        run(&ctx, "match add Old 2020-05-01 -t Seniores").await.unwrap();
        run(&ctx, "car add 1 Rui 96 3").await.unwrap();

        let past: serde_json::Value =
            serde_json::from_str(&run(&ctx, "match past").await.unwrap()).unwrap();
        assert_eq!(past[0]["match"]["date"], "2020-05-01");
        assert_eq!(past[0]["match"]["team"], "Seniores");
        assert_eq!(past[0]["cars"][0]["car"]["seats"], 3);

        let next: serde_json::Value =
            serde_json::from_str(&run(&ctx, "match next").await.unwrap()).unwrap();
        assert!(next.is_null());
    }

    #[tokio::test]
    async fn test_default_team() {
        let mut ctx = context(false).await;
        ctx.settings.default_team = Some("Juniores".to_owned());
        let tomorrow = (today() + time::Duration::days(1)).to_string();

        run(&ctx, "team add Seniores").await.unwrap();
        run(&ctx, "team add Juniores").await.unwrap();
        run(&ctx, &format!("match add First {} -t Seniores", tomorrow)).await.unwrap();
        run(&ctx, &format!("match add Second {} -t Juniores", tomorrow)).await.unwrap();

        let next = run(&ctx, "match next").await.unwrap();
        assert!(next.starts_with("Second (Juniores)"));
        let next = run(&ctx, "match next --team Seniores").await.unwrap();
        assert!(next.starts_with("First (Seniores)"));
    }
}
