//! Environment-driven settings with documented defaults.

use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;

use crate::error::PollerError;

#[derive(Clone, Debug)]
pub struct Settings {
    pub username: String,
    pub password: SecretString,
    pub base_url: String,
    pub ha_url: String,
    pub ha_webhook_id: String,
    pub ha_token: Option<SecretString>,
    /// Training-info poll interval in seconds.
    pub training_info_interval: u64,
    /// Activities poll interval in seconds.
    pub activities_interval: u64,
    /// Days of activity history requested per poll.
    pub lookback_days: u32,
    /// Refresh tokens this many seconds before expiry.
    pub token_refresh_margin: i64,
    pub token_file: PathBuf,
    pub log_level: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, PollerError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function. This avoids mutating global environment in tests and keeps
    /// `from_env()` small and safe.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, PollerError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let username = require(&mut get, "XERT_USERNAME")?;
        let password = SecretString::new(require(&mut get, "XERT_PASSWORD")?.into());
        let ha_webhook_id = require(&mut get, "XERT_HA_WEBHOOK_ID")?;

        let base_url =
            get("XERT_BASE_URL").unwrap_or_else(|| "https://www.xertonline.com".into());
        let ha_url = get("XERT_HA_URL").unwrap_or_else(|| "http://homeassistant:8123".into());
        let ha_token = get("XERT_HA_TOKEN")
            .filter(|t| !t.is_empty())
            .map(|t| SecretString::new(t.into()));

        let training_info_interval =
            parse_or(get("XERT_TRAINING_INFO_INTERVAL"), 900, "XERT_TRAINING_INFO_INTERVAL")?;
        let activities_interval =
            parse_or(get("XERT_ACTIVITIES_INTERVAL"), 900, "XERT_ACTIVITIES_INTERVAL")?;
        let lookback_days = parse_or(get("XERT_LOOKBACK_DAYS"), 90, "XERT_LOOKBACK_DAYS")?;
        let token_refresh_margin =
            parse_or(get("XERT_TOKEN_REFRESH_MARGIN"), 300, "XERT_TOKEN_REFRESH_MARGIN")?;

        let token_file = PathBuf::from(
            get("XERT_TOKEN_FILE").unwrap_or_else(|| "/data/tokens.json".into()),
        );
        let log_level = get("XERT_LOG_LEVEL")
            .or_else(|| get("RUST_LOG"))
            .unwrap_or_else(|| "info".into());

        Ok(Self {
            username,
            password,
            base_url,
            ha_url,
            ha_webhook_id,
            ha_token,
            training_info_interval,
            activities_interval,
            lookback_days,
            token_refresh_margin,
            token_file,
            log_level,
        })
    }
}

fn require<F>(get: &mut F, key: &str) -> Result<String, PollerError>
where
    F: FnMut(&str) -> Option<String>,
{
    get(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PollerError::Config(format!("{key} missing")))
}

fn parse_or<T: FromStr>(raw: Option<String>, default: T, key: &str) -> Result<T, PollerError> {
    match raw {
        None => Ok(default),
        Some(s) => s
            .trim()
            .parse()
            .map_err(|_| PollerError::Config(format!("{key} is not a valid number: {s}"))),
    }
}
