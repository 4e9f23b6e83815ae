use std::fmt;

use chrono::{DateTime, Utc};
use meso_core::model::{MesocycleId, UserId};
use meso_core::schedule::HISTORY_WINDOW_DAYS;
use services::Clock;

pub const DEFAULT_DB_URL: &str = "sqlite://dev.sqlite3";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidId { flag: &'static str, raw: String },
    InvalidAsOf { raw: String },
    InvalidHistoryDays { raw: String },
    MissingMesocycleId,
    MissingCommand,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidAsOf { raw } => {
                write!(f, "invalid --as-of value (expected RFC3339): {raw}")
            }
            ArgsError::InvalidHistoryDays { raw } => {
                write!(f, "invalid --history-days value (expected a positive integer): {raw}")
            }
            ArgsError::MissingMesocycleId => write!(f, "--mesocycle-id is required"),
            ArgsError::MissingCommand => write!(f, "no subcommand given"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_u64(flag: &'static str, raw: String) -> Result<u64, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidId { flag, raw })
}

fn parse_history_days(raw: String) -> Result<i64, ArgsError> {
    match raw.parse::<i64>() {
        Ok(days) if days > 0 => Ok(days),
        _ => Err(ArgsError::InvalidHistoryDays { raw }),
    }
}

/// Resolved settings: environment first, then flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_url: String,
    pub user_id: UserId,
    pub mesocycle_id: Option<MesocycleId>,
    pub as_of: Option<DateTime<Utc>>,
    pub history_days: i64,
    pub log_filter: String,
}

impl Config {
    /// Read `MESO_DB_URL`, `MESO_USER_ID`, `MESO_HISTORY_DAYS` and `MESO_LOG`.
    ///
    /// Unparseable numeric variables fall back to their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            db_url: lookup("MESO_DB_URL")
                .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url),
            user_id: lookup("MESO_USER_ID")
                .and_then(|value| value.parse::<u64>().ok())
                .map_or_else(|| UserId::new(1), UserId::new),
            mesocycle_id: None,
            as_of: None,
            history_days: lookup("MESO_HISTORY_DAYS")
                .and_then(|value| parse_history_days(value).ok())
                .unwrap_or(HISTORY_WINDOW_DAYS),
            log_filter: lookup("MESO_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.into()),
        }
    }

    /// Apply command-line flags on top of the current values.
    ///
    /// # Errors
    ///
    /// Returns `ArgsError` for unknown flags, missing values or unparseable values.
    pub fn apply_args(
        mut self,
        args: &mut impl Iterator<Item = String>,
    ) -> Result<Self, ArgsError> {
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    self.db_url = normalize_sqlite_url(value);
                }
                "--user-id" => {
                    let value = require_value(args, "--user-id")?;
                    self.user_id = UserId::new(parse_u64("--user-id", value)?);
                }
                "--mesocycle-id" => {
                    let value = require_value(args, "--mesocycle-id")?;
                    let id = parse_u64("--mesocycle-id", value)?;
                    self.mesocycle_id = Some(MesocycleId::new(id));
                }
                "--as-of" => {
                    let value = require_value(args, "--as-of")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidAsOf { raw: value.clone() })?;
                    self.as_of = Some(parsed.with_timezone(&Utc));
                }
                "--history-days" => {
                    let value = require_value(args, "--history-days")?;
                    self.history_days = parse_history_days(value)?;
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns `ArgsError::MissingMesocycleId` if no `--mesocycle-id` was given.
    pub fn require_mesocycle(&self) -> Result<MesocycleId, ArgsError> {
        self.mesocycle_id.ok_or(ArgsError::MissingMesocycleId)
    }

    /// Pinned to `--as-of` when given, otherwise the system clock.
    pub fn clock(&self) -> Clock {
        self.as_of.map_or(Clock::Default, Clock::fixed)
    }
}

pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Create the database file (and parent directories) so `SQLite` can open it.
///
/// # Errors
///
/// Returns an error if the URL has no path or the file cannot be created.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(raw: &[&str]) -> impl Iterator<Item = String> {
        raw.iter().map(|s| (*s).to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn env_defaults_apply_when_unset() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.db_url, DEFAULT_DB_URL);
        assert_eq!(config.user_id, UserId::new(1));
        assert_eq!(config.history_days, HISTORY_WINDOW_DAYS);
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.clock(), Clock::Default);
    }

    #[test]
    fn env_values_are_read_and_bad_numbers_ignored() {
        let env: HashMap<&str, &str> = [
            ("MESO_DB_URL", "sqlite:///tmp/meso.db"),
            ("MESO_USER_ID", "42"),
            ("MESO_HISTORY_DAYS", "-3"),
            ("MESO_LOG", "debug"),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|key| env.get(key).map(|v| (*v).to_string()));
        assert_eq!(config.db_url, "sqlite:///tmp/meso.db");
        assert_eq!(config.user_id, UserId::new(42));
        assert_eq!(config.history_days, HISTORY_WINDOW_DAYS);
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn flags_override_env() {
        let config = Config::from_lookup(|_| None)
            .apply_args(&mut args(&[
                "--user-id",
                "7",
                "--mesocycle-id",
                "3",
                "--as-of",
                "2024-01-02T03:04:05Z",
                "--history-days",
                "30",
            ]))
            .unwrap();
        assert_eq!(config.user_id, UserId::new(7));
        assert_eq!(config.require_mesocycle().unwrap(), MesocycleId::new(3));
        assert_eq!(config.history_days, 30);
        let as_of = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(config.clock(), Clock::fixed(as_of));
    }

    #[test]
    fn bad_flags_are_reported() {
        let base = || Config::from_lookup(|_| None);
        assert!(matches!(
            base().apply_args(&mut args(&["--user-id"])),
            Err(ArgsError::MissingValue { flag: "--user-id" })
        ));
        assert!(matches!(
            base().apply_args(&mut args(&["--as-of", "yesterday"])),
            Err(ArgsError::InvalidAsOf { .. })
        ));
        assert!(matches!(
            base().apply_args(&mut args(&["--history-days", "0"])),
            Err(ArgsError::InvalidHistoryDays { .. })
        ));
        assert!(matches!(
            base().apply_args(&mut args(&["--verbose"])),
            Err(ArgsError::UnknownArg(_))
        ));
        assert!(matches!(
            base().require_mesocycle(),
            Err(ArgsError::MissingMesocycleId)
        ));
    }

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:data/meso.db".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/meso.db"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }
}
