//! Service configuration parsed from environment variables.
//!
//! `.env` is loaded by `main` (via `dotenvy`) before `Config::from_env` runs,
//! so every knob here can live in either place.

use std::path::PathBuf;

use crate::locale::Locale;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 7;
pub const DEFAULT_STATS_REFRESH_SECS: u64 = 30;
pub const DEFAULT_CHANGE_HUB_CAPACITY: usize = 256;
pub const DEFAULT_MEDIA_DIR: &str = "./media";
pub const DEFAULT_MEDIA_URL_PREFIX: &str = "/media";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// Forces the `Secure` cookie attribute. Defaults to off for local HTTP.
    pub cookie_secure: bool,
    pub session_ttl_hours: i64,
    /// Locale for server-rendered text (notifications) and error fallback.
    pub default_locale: Locale,
    pub stats_refresh_secs: u64,
    pub change_hub_capacity: usize,
    pub media_dir: PathBuf,
    pub media_url_prefix: String,
    pub max_upload_bytes: usize,
    pub seed_demo_accounts: bool,
}

impl Config {
    /// Build typed config from the process environment.
    ///
    /// Required:
    /// - `DATABASE_URL`
    ///
    /// Optional:
    /// - `PORT` (3000), `DB_MAX_CONNECTIONS` (5)
    /// - `COOKIE_SECURE` (false), `SESSION_TTL_HOURS` (168)
    /// - `DEFAULT_LOCALE`: `pt` (default), `es` or `en`
    /// - `STATS_REFRESH_SECS` (30), `CHANGE_HUB_CAPACITY` (256)
    /// - `MEDIA_DIR` (./media), `MEDIA_URL_PREFIX` (/media), `MAX_UPLOAD_BYTES` (10 MiB)
    /// - `SEED_DEMO_ACCOUNTS` (false)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when `DATABASE_URL` is absent or a value fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. `from_env` delegates here;
    /// tests pass a map instead of mutating the process environment.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let default_locale = match lookup("DEFAULT_LOCALE") {
            Some(raw) => Locale::parse(&raw).ok_or(ConfigError::Invalid { key: "DEFAULT_LOCALE", value: raw })?,
            None => Locale::default(),
        };

        let media_url_prefix = lookup("MEDIA_URL_PREFIX")
            .unwrap_or_else(|| DEFAULT_MEDIA_URL_PREFIX.to_owned())
            .trim_end_matches('/')
            .to_owned();
        if !media_url_prefix.starts_with('/') {
            return Err(ConfigError::Invalid { key: "MEDIA_URL_PREFIX", value: media_url_prefix });
        }

        Ok(Self {
            database_url,
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
            cookie_secure: bool_or(&lookup, "COOKIE_SECURE", false)?,
            session_ttl_hours: parse_or(&lookup, "SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)?,
            default_locale,
            stats_refresh_secs: parse_or(&lookup, "STATS_REFRESH_SECS", DEFAULT_STATS_REFRESH_SECS)?,
            change_hub_capacity: parse_or(&lookup, "CHANGE_HUB_CAPACITY", DEFAULT_CHANGE_HUB_CAPACITY)?,
            media_dir: lookup("MEDIA_DIR").map_or_else(|| PathBuf::from(DEFAULT_MEDIA_DIR), PathBuf::from),
            media_url_prefix,
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            seed_demo_accounts: bool_or(&lookup, "SEED_DEMO_ACCOUNTS", false)?,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

fn bool_or(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match lookup(key) {
        Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
