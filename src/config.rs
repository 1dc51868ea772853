use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_SYNC_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: Option<PathBuf>,
    pub database_url: Option<String>,
    pub sync_delay: Duration,
}

impl Settings {
    pub fn from_env(data_dir: Option<PathBuf>) -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        let sync_delay =
            sync_delay_or_default(std::env::var("RESULT_SLIP_SYNC_DELAY_MS").ok().as_deref());

        Self {
            data_dir,
            database_url,
            sync_delay,
        }
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a Postgres instance for this command")
    }
}

/// Malformed values print a warning and yield the default.
pub fn sync_delay_or_default(raw: Option<&str>) -> Duration {
    parse_sync_delay(raw).unwrap_or_else(|err| {
        eprintln!("Warning: {err:#}; using {} ms", DEFAULT_SYNC_DELAY.as_millis());
        DEFAULT_SYNC_DELAY
    })
}

pub fn parse_sync_delay(raw: Option<&str>) -> anyhow::Result<Duration> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(DEFAULT_SYNC_DELAY),
        Some(value) => {
            let millis: u64 = value
                .parse()
                .with_context(|| format!("RESULT_SLIP_SYNC_DELAY_MS must be milliseconds, got {value:?}"))?;
            Ok(Duration::from_millis(millis))
        }
    }
}
