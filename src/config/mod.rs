//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing.
//! Sensitive values wrapped in secrecy::SecretString to prevent log leaks.

pub mod secrets;

use std::path::PathBuf;

use chrono::{FixedOffset, Offset, Utc};

use crate::error::{Error, Result};
use secrets::SecretString;

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    /// Offset used to decide which calendar day an activity falls on.
    pub day_offset: FixedOffset,
    pub catalog_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    /// In production, systemd EnvironmentFile provides the vars.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            day_offset: day_offset_var("PROGRESSION_UTC_OFFSET_MINUTES")?,
            catalog_dir: std::env::var("CATALOG_DIR").ok().map(PathBuf::from),
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

/// Parse a whole-minute UTC offset. Unset means UTC.
fn day_offset_var(name: &str) -> Result<FixedOffset> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(Utc.fix());
    };

    let minutes: i32 = raw
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{name} must be an integer number of minutes, got {raw:?}")))?;

    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| Error::Config(format!("{name} is out of range: {minutes}")))
}
