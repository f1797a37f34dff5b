use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DATABASE: &str = "athletes.db";

/// Json struct for installation settings
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    /// Location of the SQLite database file
    pub database: Option<PathBuf>,

    /// Team used by `match next` and `available` when none is given
    pub default_team: Option<String>,

    /// Default log filter, e.g. `info` or `andeboleias=debug`
    pub log_level: Option<String>,
}

impl Settings {
    pub fn load(file: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read settings file {}", file.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse settings file {}", file.display()))
    }

    /// Picks the database path: explicit override, then settings, then default.
    pub fn database_path(&self, cli_override: Option<&Path>) -> PathBuf {
        cli_override
            .map(Path::to_path_buf)
            .or_else(|| self.database.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE))
    }

    pub fn log_filter(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings() {
        let settings: Settings = serde_json::from_str(r#"{ "default_team": "Seniores" }"#).unwrap();
        assert_eq!(settings.default_team.as_deref(), Some("Seniores"));
        assert_eq!(settings.database_path(None), PathBuf::from(DEFAULT_DATABASE));
        assert_eq!(settings.log_filter(), "info");
    }

    #[test]
    fn test_database_precedence() {
        let settings = Settings {
            database: Some(PathBuf::from("club.db")),
            ..Default::default()
        };
        assert_eq!(settings.database_path(None), PathBuf::from("club.db"));
        assert_eq!(
            settings.database_path(Some(Path::new("other.db"))),
            PathBuf::from("other.db")
        );
    }
}
