//! Runtime configuration resolved from the environment.

use std::env;
use std::path::PathBuf;

use stockdigest_warehouse::WarehouseConfig;

use crate::cache::{DEFAULT_CLEANUP_DAYS, DEFAULT_MAX_AGE_HOURS};
use crate::error::CoreError;

pub const HOME_VAR: &str = "STOCKDIGEST_HOME";
const DEFAULT_HOME_DIR: &str = ".stockdigest";
pub const ALPHA_VANTAGE_KEY_VARS: [&str; 2] =
    ["ALPHA_VANTAGE_API_KEY", "STOCKDIGEST_ALPHA_VANTAGE_API_KEY"];
pub const YAHOO_ENABLED_VAR: &str = "STOCKDIGEST_YAHOO_ENABLED";
pub const MAX_DAILY_CALLS_VAR: &str = "STOCKDIGEST_MAX_DAILY_CALLS";
pub const FRESHNESS_HOURS_VAR: &str = "STOCKDIGEST_FRESHNESS_HOURS";
pub const CLEANUP_DAYS_VAR: &str = "STOCKDIGEST_CLEANUP_DAYS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestConfig {
    pub home: PathBuf,
    pub alpha_vantage_api_key: Option<String>,
    pub yahoo_enabled: bool,
    /// Explicit daily budget. When unset, sources keep their persisted limit
    /// and new sources start at [`crate::DEFAULT_MAX_DAILY_CALLS`].
    pub max_daily_calls: Option<u32>,
    pub freshness_hours: u32,
    pub cleanup_days: u32,
}

impl DigestConfig {
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let home = var(HOME_VAR)
            .map(PathBuf::from)
            .or_else(|| var("HOME").map(|home| PathBuf::from(home).join(DEFAULT_HOME_DIR)))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HOME_DIR));

        Ok(Self {
            home,
            alpha_vantage_api_key: ALPHA_VANTAGE_KEY_VARS.iter().find_map(|name| var(*name)),
            yahoo_enabled: parse_flag(YAHOO_ENABLED_VAR, var(YAHOO_ENABLED_VAR), true)?,
            max_daily_calls: var(MAX_DAILY_CALLS_VAR)
                .map(|value| parse_count(MAX_DAILY_CALLS_VAR, Some(value), 0))
                .transpose()?,
            freshness_hours: parse_count(
                FRESHNESS_HOURS_VAR,
                var(FRESHNESS_HOURS_VAR),
                DEFAULT_MAX_AGE_HOURS,
            )?,
            cleanup_days: parse_count(CLEANUP_DAYS_VAR, var(CLEANUP_DAYS_VAR), DEFAULT_CLEANUP_DAYS)?,
        })
    }

    #[must_use]
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    pub fn warehouse_config(&self) -> WarehouseConfig {
        WarehouseConfig::for_home(&self.home)
    }

    /// Directory holding the database, the metadata mirror and CSV snapshots.
    pub fn cache_dir(&self) -> PathBuf {
        self.warehouse_config().cache_dir()
    }
}

fn parse_flag(name: &str, value: Option<String>, default: bool) -> Result<bool, CoreError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CoreError::Config(format!(
            "{name} must be a boolean, got '{value}'"
        ))),
    }
}

fn parse_count(name: &str, value: Option<String>, default: u32) -> Result<u32, CoreError> {
    match value {
        None => Ok(default),
        Some(value) => value.parse::<u32>().map_err(|_| {
            CoreError::Config(format!("{name} must be a non-negative integer, got '{value}'"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<DigestConfig, CoreError> {
        let vars = vars
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        DigestConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[(HOME_VAR, "/tmp/digest")]).expect("config");
        assert_eq!(config.home, PathBuf::from("/tmp/digest"));
        assert_eq!(config.alpha_vantage_api_key, None);
        assert!(config.yahoo_enabled);
        assert_eq!(config.max_daily_calls, None);
        assert_eq!(config.freshness_hours, 24);
        assert_eq!(config.cleanup_days, 7);
        assert_eq!(config.cache_dir(), PathBuf::from("/tmp/digest/cache"));
    }

    #[test]
    fn prefixed_key_is_a_fallback() {
        let config = config(&[
            (HOME_VAR, "/tmp/digest"),
            ("ALPHA_VANTAGE_API_KEY", " "),
            ("STOCKDIGEST_ALPHA_VANTAGE_API_KEY", "abc"),
            (YAHOO_ENABLED_VAR, "off"),
            (MAX_DAILY_CALLS_VAR, "3"),
        ])
        .expect("config");
        assert_eq!(config.alpha_vantage_api_key.as_deref(), Some("abc"));
        assert!(!config.yahoo_enabled);
        assert_eq!(config.max_daily_calls, Some(3));
    }

    #[test]
    fn malformed_numbers_are_config_errors() {
        let error = config(&[(HOME_VAR, "/tmp/digest"), (FRESHNESS_HOURS_VAR, "-4")])
            .expect_err("invalid");
        assert!(matches!(error, CoreError::Config(message) if message.contains(FRESHNESS_HOURS_VAR)));
    }
}
