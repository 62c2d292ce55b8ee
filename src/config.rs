//! Service configuration.
//!
//! Values come from the process environment (after loading `.env`), with an
//! optional TOML file named by `RESMON_CONFIG` supplying anything the
//! environment does not. Keys in the file are the lowercase form of the
//! environment names, e.g. `alert_decrease = 4.0`.

use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;

use crate::error::ConfigError;

pub const DEFAULT_ALERT_DECREASE: f64 = 4.0;
pub const DEFAULT_CAUTION_MARGIN: f64 = 2.0;
pub const DEFAULT_IMMINENT_MARGIN: f64 = 1.0;
pub const DEFAULT_POLL_INTERVAL_MINUTES: u64 = 30;
pub const DEFAULT_DISPLAY_UTC_OFFSET_HOURS: i32 = 9;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_STALE_AFTER_MINUTES: u64 = 120;
pub const DEFAULT_PORT: u16 = 10000;

/// Credentials and identifiers for the chat platform.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub token: String,
    /// Needed to edit deferred interaction replies.
    pub application_id: Option<String>,
    /// Hex-encoded Ed25519 key used to verify incoming interactions.
    pub public_key: Option<String>,
    pub alert_channel_id: String,
    /// REST API root; overridable so tests can point at a local server.
    pub api_base: String,
}

impl DiscordConfig {
    /// Interactions can only be served when both identifiers are present.
    pub fn interactions_enabled(&self) -> bool {
        self.application_id.is_some() && self.public_key.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub provider_base_url: String,
    pub discord: DiscordConfig,
    /// Percentage-point drop from baseline that triggers the alert.
    pub alert_decrease: f64,
    /// Remaining margin at or below which status reports "caution".
    pub caution_margin: f64,
    /// Remaining margin at or below which status reports "imminent".
    pub imminent_margin: f64,
    pub poll_interval: Duration,
    /// Offset used for human-facing times and tick alignment only.
    pub display_offset: FixedOffset,
    pub request_timeout: Duration,
    pub stale_after_minutes: u64,
    pub port: u16,
    pub reservoir_name: String,
    pub dev_readings: Option<Vec<f64>>,
    pub log_level: String,
    pub log_file: Option<String>,
}

impl Config {
    /// Loads `.env`, the optional TOML file, and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let file = match std::env::var("RESMON_CONFIG") {
            Ok(path) => Some(read_table(&path)?),
            Err(_) => None,
        };

        Self::from_lookup(|key| {
            std::env::var(key)
                .ok()
                .or_else(|| file.as_ref().and_then(|table| table_value(table, key)))
        })
    }

    /// Builds a configuration from any key lookup.
    ///
    /// Keys are the environment variable names read by `Config::load`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider_base_url = required(&lookup, "PROVIDER_BASE_URL")?;
        let discord = DiscordConfig {
            token: required(&lookup, "DISCORD_TOKEN")?,
            application_id: optional(&lookup, "DISCORD_APPLICATION_ID"),
            public_key: optional(&lookup, "DISCORD_PUBLIC_KEY"),
            alert_channel_id: required(&lookup, "ALERT_CHANNEL_ID")?,
            api_base: optional(&lookup, "DISCORD_API_BASE")
                .unwrap_or_else(|| "https://discord.com/api/v10".to_string()),
        };

        let alert_decrease: f64 = parsed(&lookup, "ALERT_DECREASE", DEFAULT_ALERT_DECREASE)?;
        if !alert_decrease.is_finite() || alert_decrease <= 0.0 {
            return Err(invalid("ALERT_DECREASE", "must be a positive number"));
        }

        let caution_margin: f64 = parsed(&lookup, "CAUTION_MARGIN", DEFAULT_CAUTION_MARGIN)?;
        let imminent_margin: f64 = parsed(&lookup, "IMMINENT_MARGIN", DEFAULT_IMMINENT_MARGIN)?;
        for (key, margin) in [
            ("CAUTION_MARGIN", caution_margin),
            ("IMMINENT_MARGIN", imminent_margin),
        ] {
            if !margin.is_finite() || margin < 0.0 {
                return Err(invalid(key, "must be a non-negative number"));
            }
        }
        if imminent_margin > caution_margin {
            return Err(invalid("IMMINENT_MARGIN", "must not exceed CAUTION_MARGIN"));
        }

        let poll_minutes: u64 =
            parsed(&lookup, "POLL_INTERVAL_MINUTES", DEFAULT_POLL_INTERVAL_MINUTES)?;
        if poll_minutes == 0 {
            return Err(invalid("POLL_INTERVAL_MINUTES", "must be at least 1"));
        }

        let offset_hours: i32 = parsed(
            &lookup,
            "DISPLAY_UTC_OFFSET_HOURS",
            DEFAULT_DISPLAY_UTC_OFFSET_HOURS,
        )?;
        let display_offset = offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| invalid("DISPLAY_UTC_OFFSET_HOURS", "out of range"))?;

        let timeout_secs: u64 =
            parsed(&lookup, "REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(invalid("REQUEST_TIMEOUT_SECS", "must be at least 1"));
        }

        let dev_readings = match optional(&lookup, "DEV_READINGS") {
            Some(raw) => Some(parse_rates(&raw)?),
            None => None,
        };

        Ok(Config {
            provider_base_url,
            discord,
            alert_decrease,
            caution_margin,
            imminent_margin,
            poll_interval: Duration::from_secs(poll_minutes * 60),
            display_offset,
            request_timeout: Duration::from_secs(timeout_secs),
            stale_after_minutes: parsed(
                &lookup,
                "STALE_AFTER_MINUTES",
                DEFAULT_STALE_AFTER_MINUTES,
            )?,
            port: parsed(&lookup, "PORT", DEFAULT_PORT)?,
            reservoir_name: optional(&lookup, "RESERVOIR_NAME")
                .unwrap_or_else(|| "Reservoir".to_string()),
            dev_readings,
            log_level: optional(&lookup, "LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_file: optional(&lookup, "LOG_FILE"),
        })
    }
}

// ---------------------------------------------------------------------------
// Lookup helpers
// ---------------------------------------------------------------------------

fn optional<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    key: &'static str,
) -> Result<String, ConfigError> {
    optional(lookup, key).ok_or(ConfigError::Missing(key))
}

fn parsed<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match optional(lookup, key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| invalid(key, &e.to_string())),
        None => Ok(default),
    }
}

fn invalid(key: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.to_string(),
    }
}

/// Parses a comma-separated list of percentages, e.g. `"75, 74.5, 70"`.
fn parse_rates(raw: &str) -> Result<Vec<f64>, ConfigError> {
    let rates = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|e| invalid("DEV_READINGS", &format!("{s:?}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if rates.is_empty() {
        return Err(invalid("DEV_READINGS", "no rates given"));
    }
    Ok(rates)
}

fn read_table(path: &str) -> Result<toml::Table, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    text.parse::<toml::Table>().map_err(|e| ConfigError::File {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

fn table_value(table: &toml::Table, key: &str) -> Option<String> {
    match table.get(&key.to_lowercase())? {
        toml::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
