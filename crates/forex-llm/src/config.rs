//! Model settings shared by LLM-backed components

use forex_utils::env_var;
use serde::{Deserialize, Serialize};

use crate::{LLMError, Result};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Which model to call and how
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1024,
            temperature: 0.2,
        }
    }
}

impl LlmConfig {
    /// Load overrides from `FOREX_MODEL`, `FOREX_MAX_TOKENS` and
    /// `FOREX_TEMPERATURE`
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            model: env_var("FOREX_MODEL")?.unwrap_or(defaults.model),
            max_tokens: env_var("FOREX_MAX_TOKENS")?.unwrap_or(defaults.max_tokens),
            temperature: env_var("FOREX_TEMPERATURE")?.unwrap_or(defaults.temperature),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(LLMError::InvalidConfig("model must not be empty".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(LLMError::InvalidConfig(
                "max_tokens must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(LLMError::InvalidConfig(format!(
                "temperature must be within 0.0-1.0, got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        tokio_test::assert_ok!(LlmConfig::default().validate());
    }

    #[test]
    fn test_validation() {
        let mut config = LlmConfig::default();
        config.temperature = 1.5;
        tokio_test::assert_err!(config.validate());
        tokio_test::assert_err!(LlmConfig::default().with_model(" ").validate());
    }
}
