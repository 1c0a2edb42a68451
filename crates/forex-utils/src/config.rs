//! Configuration management utilities

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while resolving configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable was set but could not be parsed
    #[error("invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// A required setting is missing
    #[error("missing required setting: {0}")]
    Missing(String),

    /// A setting is present but outside its allowed range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Read and parse an environment variable.
///
/// Unset or blank variables yield `Ok(None)`. A variable that is set but does
/// not parse is an error rather than a silent fallback to the default.
pub fn env_var<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

/// Like [`env_var`], falling back to `default` when the variable is unset.
pub fn env_var_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    Ok(env_var(key)?.unwrap_or(default))
}

/// Process-level application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name
    pub app_name: String,
    /// Environment (dev, prod, etc.)
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "forex-agent-rs".to_string(),
            environment: "development".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `APP_NAME` / `APP_ENV`, keeping defaults for unset values
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            app_name: std::env::var("APP_NAME").unwrap_or(defaults.app_name),
            environment: std::env::var("APP_ENV").unwrap_or(defaults.environment),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable name so parallel tests don't interfere.

    #[test]
    fn test_env_var_missing_is_none() {
        let value: Option<f64> = env_var("FOREX_UTILS_TEST_UNSET_VAR").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_env_var_parses() {
        unsafe { std::env::set_var("FOREX_UTILS_TEST_BALANCE", "2500.5") };
        let value: Option<f64> = env_var("FOREX_UTILS_TEST_BALANCE").unwrap();
        assert_eq!(value, Some(2500.5));
    }

    #[test]
    fn test_env_var_malformed_is_error() {
        unsafe { std::env::set_var("FOREX_UTILS_TEST_BAD", "ten thousand") };
        let err = env_var::<f64>("FOREX_UTILS_TEST_BAD").unwrap_err();
        let ConfigError::InvalidValue { ref key, .. } = err else {
            panic!("expected InvalidValue, got {err:?}");
        };
        assert_eq!(key, "FOREX_UTILS_TEST_BAD");
    }

    #[test]
    fn test_env_var_or_default() {
        let value = tokio_test::assert_ok!(env_var_or("FOREX_UTILS_TEST_DEFAULTED", 60_u64));
        assert_eq!(value, 60);
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.app_name, "forex-agent-rs");
    }
}
