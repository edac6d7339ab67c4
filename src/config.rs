//! Runtime configuration parsed from environment variables.

use std::path::PathBuf;

pub const DEFAULT_API_BASE_URL: &str = "https://uselessfacts.jsph.pl/api/v2";
pub const DEFAULT_DATA_DIR: &str = ".factbook";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Facts API base URL, no trailing slash.
    pub api_base_url: String,
    /// Remote log endpoint used in production mode.
    pub log_url: String,
    /// Ship logs to `log_url` instead of writing them locally.
    pub production: bool,
    /// Directory holding the persisted favorites.
    pub data_dir: PathBuf,
    pub timeouts: Timeouts,
}

impl Config {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `FACTBOOK_API_BASE_URL`: default [`DEFAULT_API_BASE_URL`]
    /// - `FACTBOOK_LOG_URL`: default `{api_base_url}/logs`
    /// - `FACTBOOK_PRODUCTION`: `true`/`1`/`false`/`0`, default false
    /// - `FACTBOOK_DATA_DIR`: default [`DEFAULT_DATA_DIR`]
    /// - `FACTBOOK_REQUEST_TIMEOUT_SECS`: default 10
    /// - `FACTBOOK_CONNECT_TIMEOUT_SECS`: default 5
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for an unrecognized `FACTBOOK_PRODUCTION`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = trim_base_url(
            &std::env::var("FACTBOOK_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_owned()),
        );
        let log_url = std::env::var("FACTBOOK_LOG_URL").unwrap_or_else(|_| format!("{api_base_url}/logs"));
        let production = parse_bool("FACTBOOK_PRODUCTION", std::env::var("FACTBOOK_PRODUCTION").ok().as_deref())?;
        let data_dir = std::env::var("FACTBOOK_DATA_DIR").map_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from);
        let timeouts = Timeouts {
            request_secs: env_parse("FACTBOOK_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("FACTBOOK_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self { api_base_url, log_url, production, data_dir, timeouts })
    }

    /// Apply command-line overrides on top of the environment.
    #[must_use]
    pub fn with_overrides(mut self, api_base_url: Option<&str>, data_dir: Option<PathBuf>) -> Self {
        if let Some(url) = api_base_url {
            self.api_base_url = trim_base_url(url);
        }
        if let Some(dir) = data_dir {
            self.data_dir = dir;
        }
        self
    }
}

pub(crate) fn trim_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_owned()
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_bool(key: &str, raw: Option<&str>) -> Result<bool, ConfigError> {
    match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("" | "false" | "0") => Ok(false),
        Some("true" | "1") => Ok(true),
        Some(other) => Err(ConfigError::Parse(format!("invalid {key}: {other}"))),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
