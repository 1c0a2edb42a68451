//! Pipeline configuration

use std::time::Duration;

use forex_risk::RiskConfig;
use forex_utils::env_var;

use crate::error::{PipelineError, Result};

/// Configuration for one [`Pipeline`](crate::Pipeline)
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Timeout applied to each analysis task individually
    pub task_timeout: Duration,

    /// Deadline for the whole parallel analysis stage
    pub stage_timeout: Duration,

    /// Buffer size of the event channels
    pub event_capacity: usize,

    /// Default risk settings; callers may override balance and risk per run
    pub risk: RiskConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            task_timeout: Duration::from_secs(60),
            stage_timeout: Duration::from_secs(120),
            event_capacity: 256,
            risk: RiskConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load from `TASK_TIMEOUT_SECONDS`, `STAGE_TIMEOUT_SECONDS` and the
    /// risk variables read by [`RiskConfig::from_env`]
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder().risk(RiskConfig::from_env()?);
        if let Some(secs) = env_var::<u64>("TASK_TIMEOUT_SECONDS")? {
            builder = builder.task_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = env_var::<u64>("STAGE_TIMEOUT_SECONDS")? {
            builder = builder.stage_timeout(Duration::from_secs(secs));
        }
        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.task_timeout.is_zero() {
            return Err(PipelineError::InvalidConfig(
                "task_timeout must be greater than 0".to_string(),
            ));
        }
        if self.stage_timeout.is_zero() {
            return Err(PipelineError::InvalidConfig(
                "stage_timeout must be greater than 0".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(PipelineError::InvalidConfig(
                "event_capacity must be greater than 0".to_string(),
            ));
        }
        self.risk.validate()?;
        Ok(())
    }
}

/// Builder for PipelineConfig
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    task_timeout: Option<Duration>,
    stage_timeout: Option<Duration>,
    event_capacity: Option<usize>,
    risk: Option<RiskConfig>,
}

impl PipelineConfigBuilder {
    pub fn task_timeout(mut self, duration: Duration) -> Self {
        self.task_timeout = Some(duration);
        self
    }

    pub fn stage_timeout(mut self, duration: Duration) -> Self {
        self.stage_timeout = Some(duration);
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }

    pub fn risk(mut self, risk: RiskConfig) -> Self {
        self.risk = Some(risk);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<PipelineConfig> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            task_timeout: self.task_timeout.unwrap_or(defaults.task_timeout),
            stage_timeout: self.stage_timeout.unwrap_or(defaults.stage_timeout),
            event_capacity: self.event_capacity.unwrap_or(defaults.event_capacity),
            risk: self.risk.unwrap_or(defaults.risk),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.task_timeout, Duration::from_secs(60));
        assert_eq!(config.stage_timeout, Duration::from_secs(120));
        assert_eq!(config.event_capacity, 256);
        tokio_test::assert_ok!(config.validate());
    }

    #[test]
    fn test_invalid_values() {
        let zero_timeout = PipelineConfig::builder().task_timeout(Duration::ZERO);
        tokio_test::assert_err!(zero_timeout.build());
        tokio_test::assert_err!(PipelineConfig::builder().event_capacity(0).build());

        let mut config = PipelineConfig::default();
        config.risk.account_balance = -1.0;
        assert!(matches!(config.validate(), Err(PipelineError::Risk(_))));
    }
}
