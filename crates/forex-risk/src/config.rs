//! Configuration for the risk gate

use forex_core::CurrencyPair;
use forex_utils::env_var;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RiskError};

/// Pips per unit of price for most pairs
pub const STANDARD_PIP_SCALE: f64 = 10_000.0;
/// Pips per unit of price for yen-quoted pairs
pub const JPY_PIP_SCALE: f64 = 100.0;

/// Risk rules and account settings used to size and vet trades
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Account balance in account currency
    pub account_balance: f64,
    /// Fraction of the balance risked per trade
    pub max_risk_fraction: f64,
    /// Stops tighter than this are rejected as noise-prone
    pub min_risk_pips: f64,
    /// Stops wider than this are rejected as excessive exposure
    pub max_risk_pips: f64,
    pub min_risk_reward_ratio: f64,
    /// Account-currency value of one pip on one standard lot
    pub pip_value: f64,
    /// Forces a pip scale instead of deriving it from the quote currency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pip_scale_override: Option<f64>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            account_balance: 10_000.0,
            max_risk_fraction: 0.02,
            min_risk_pips: 10.0,
            max_risk_pips: 100.0,
            min_risk_reward_ratio: 1.5,
            pip_value: 10.0,
            pip_scale_override: None,
        }
    }
}

/// Per-run account overrides supplied by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub balance: Option<f64>,
    pub max_risk_fraction: Option<f64>,
}

impl AccountConfig {
    pub fn new(balance: f64, max_risk_fraction: f64) -> Self {
        Self {
            balance: Some(balance),
            max_risk_fraction: Some(max_risk_fraction),
        }
    }
}

impl RiskConfig {
    /// Create a new configuration builder
    pub fn builder() -> RiskConfigBuilder {
        RiskConfigBuilder::default()
    }

    /// Load from the environment, keeping defaults for unset variables.
    ///
    /// Reads `ACCOUNT_BALANCE`, `MAX_RISK_PER_TRADE`, `MIN_RISK_PIPS`,
    /// `MAX_RISK_PIPS` and `MIN_RISK_REWARD_RATIO`. A malformed value is an
    /// error, never a silent default.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(balance) = env_var("ACCOUNT_BALANCE")? {
            builder = builder.account_balance(balance);
        }
        if let Some(fraction) = env_var("MAX_RISK_PER_TRADE")? {
            builder = builder.max_risk_fraction(fraction);
        }
        if let Some(pips) = env_var("MIN_RISK_PIPS")? {
            builder = builder.min_risk_pips(pips);
        }
        if let Some(pips) = env_var("MAX_RISK_PIPS")? {
            builder = builder.max_risk_pips(pips);
        }
        if let Some(ratio) = env_var("MIN_RISK_REWARD_RATIO")? {
            builder = builder.min_risk_reward_ratio(ratio);
        }
        builder.build()
    }

    /// Apply caller overrides and re-validate
    pub fn with_account(&self, account: &AccountConfig) -> Result<Self> {
        let mut config = self.clone();
        if let Some(balance) = account.balance {
            config.account_balance = balance;
        }
        if let Some(fraction) = account.max_risk_fraction {
            config.max_risk_fraction = fraction;
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: f64) -> Result<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(RiskError::InvalidConfig(format!(
                    "{name} must be a positive number, got {value}"
                )))
            }
        }

        positive("account_balance", self.account_balance)?;
        positive("max_risk_fraction", self.max_risk_fraction)?;
        positive("max_risk_pips", self.max_risk_pips)?;
        positive("pip_value", self.pip_value)?;

        if self.max_risk_fraction > 1.0 {
            return Err(RiskError::InvalidConfig(format!(
                "max_risk_fraction must not exceed 1.0, got {}",
                self.max_risk_fraction
            )));
        }
        if !(self.min_risk_pips.is_finite() && self.min_risk_pips >= 0.0) {
            return Err(RiskError::InvalidConfig(
                "min_risk_pips must be zero or positive".to_string(),
            ));
        }
        if self.min_risk_pips >= self.max_risk_pips {
            return Err(RiskError::InvalidConfig(format!(
                "min_risk_pips ({}) must be below max_risk_pips ({})",
                self.min_risk_pips, self.max_risk_pips
            )));
        }
        if !(self.min_risk_reward_ratio.is_finite() && self.min_risk_reward_ratio >= 0.0) {
            return Err(RiskError::InvalidConfig(
                "min_risk_reward_ratio must be zero or positive".to_string(),
            ));
        }
        if let Some(scale) = self.pip_scale_override {
            positive("pip_scale_override", scale)?;
        }
        Ok(())
    }

    /// Pips per unit of price for `pair`
    pub fn pip_scale(&self, pair: &CurrencyPair) -> f64 {
        match self.pip_scale_override {
            Some(scale) => scale,
            None if pair.is_jpy_quoted() => JPY_PIP_SCALE,
            None => STANDARD_PIP_SCALE,
        }
    }

    /// Amount of the balance put at risk by one trade
    pub fn dollar_risk(&self) -> f64 {
        self.account_balance * self.max_risk_fraction
    }
}

/// Builder for RiskConfig
#[derive(Debug, Default)]
pub struct RiskConfigBuilder {
    account_balance: Option<f64>,
    max_risk_fraction: Option<f64>,
    min_risk_pips: Option<f64>,
    max_risk_pips: Option<f64>,
    min_risk_reward_ratio: Option<f64>,
    pip_value: Option<f64>,
    pip_scale_override: Option<f64>,
}

impl RiskConfigBuilder {
    pub fn account_balance(mut self, balance: f64) -> Self {
        self.account_balance = Some(balance);
        self
    }

    pub fn max_risk_fraction(mut self, fraction: f64) -> Self {
        self.max_risk_fraction = Some(fraction);
        self
    }

    pub fn min_risk_pips(mut self, pips: f64) -> Self {
        self.min_risk_pips = Some(pips);
        self
    }

    pub fn max_risk_pips(mut self, pips: f64) -> Self {
        self.max_risk_pips = Some(pips);
        self
    }

    pub fn min_risk_reward_ratio(mut self, ratio: f64) -> Self {
        self.min_risk_reward_ratio = Some(ratio);
        self
    }

    pub fn pip_value(mut self, value: f64) -> Self {
        self.pip_value = Some(value);
        self
    }

    pub fn pip_scale_override(mut self, scale: f64) -> Self {
        self.pip_scale_override = Some(scale);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<RiskConfig> {
        let defaults = RiskConfig::default();

        let config = RiskConfig {
            account_balance: self.account_balance.unwrap_or(defaults.account_balance),
            max_risk_fraction: self.max_risk_fraction.unwrap_or(defaults.max_risk_fraction),
            min_risk_pips: self.min_risk_pips.unwrap_or(defaults.min_risk_pips),
            max_risk_pips: self.max_risk_pips.unwrap_or(defaults.max_risk_pips),
            min_risk_reward_ratio: self
                .min_risk_reward_ratio
                .unwrap_or(defaults.min_risk_reward_ratio),
            pip_value: self.pip_value.unwrap_or(defaults.pip_value),
            pip_scale_override: self.pip_scale_override.or(defaults.pip_scale_override),
        };

        config.validate()?;
        Ok(config)
    }
}
