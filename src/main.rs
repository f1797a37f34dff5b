use std::path::PathBuf;

use clap::Parser;

use crate::{
    cmd::{run_command, Context, RunType},
    core::{db::LedgerDb, settings::Settings},
};

mod cmd;
mod core;
mod error;
mod util;

#[derive(Parser, Debug)]
#[command(name = "andeboleias")]
#[command(version = "0.1")]
#[command(about = "Rosters and carpools for club matches.", long_about = None)]
struct Args {
    /// JSON settings file with the database path and default team.
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    /// SQLite database file. Overrides the settings file.
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: RunType,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let settings = match &args.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_filter()),
    )
    .init();

    let database = settings.database_path(args.database.as_deref());
    log::info!("Using database {}", database.display());

    let ctx = Context {
        db: LedgerDb::open(&database).await?,
        settings,
        database,
        json: args.json,
    };

    let result = run_command(&ctx, args.command).await;
    ctx.db.close().await;

    println!("{}", result?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;
    use crate::cmd::{CarAction, MatchAction};

    #[test]
    fn test_global_flags() {
        let args = Args::try_parse_from([
            "andeboleias",
            "car",
            "add",
            "4",
            "Rui",
            "912345678",
            "3",
            "--database",
            "club.db",
            "--json",
        ])
        .unwrap();

        assert_eq!(args.database, Some(PathBuf::from("club.db")));
        assert!(args.json);
        assert_eq!(
            args.command,
            RunType::Car {
                action: CarAction::Add {
                    match_id: 4,
                    driver: "Rui".to_owned(),
                    contact: "912345678".to_owned(),
                    seats: 3,
                }
            }
        );
    }

    #[test]
    fn test_match_args() {
        let args = Args::try_parse_from([
            "andeboleias",
            "match",
            "add",
            "Benfica",
            "2026-10-20",
            "--team",
            "Juniores",
        ])
        .unwrap();

        assert_eq!(
            args.command,
            RunType::Match {
                action: MatchAction::Add {
                    name: "Benfica".to_owned(),
                    date: date!(2026 - 10 - 20),
                    team: "Juniores".to_owned(),
                    maps_link: None,
                }
            }
        );

        assert!(Args::try_parse_from(["andeboleias", "match", "add", "Benfica", "20/10/2026", "-t", "Juniores"]).is_err());
        assert!(Args::try_parse_from(["andeboleias", "athlete", "add", "Ana", "911"]).is_err());
    }
}
