//! Configuration for the price data service

use std::time::Duration;

use forex_utils::env_var;
use serde::{Deserialize, Serialize};

use crate::error::{PriceError, Result};

pub const METAL_API_BASE_URL: &str = "https://api.metalpriceapi.com/v1";
pub const FOREX_API_BASE_URL: &str = "https://api.forexrateapi.com/v1";

/// Configuration for price lookups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceConfig {
    /// How long a cached quote stays valid
    pub cache_ttl: Duration,

    /// Per-call upstream timeout
    pub request_timeout: Duration,

    /// Requests per minute allowed against each upstream
    pub rate_limit_per_minute: u32,

    /// metalpriceapi.com key (optional; lookups are unavailable without it)
    #[serde(skip_serializing)]
    pub metal_api_key: Option<String>,

    /// forexrateapi.com key (optional; lookups are unavailable without it)
    #[serde(skip_serializing)]
    pub forex_api_key: Option<String>,

    pub metal_base_url: String,
    pub forex_base_url: String,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(60),
            request_timeout: Duration::from_secs(5),
            rate_limit_per_minute: 60,
            metal_api_key: None,
            forex_api_key: None,
            metal_base_url: METAL_API_BASE_URL.to_string(),
            forex_base_url: FOREX_API_BASE_URL.to_string(),
        }
    }
}

impl PriceConfig {
    /// Create a new configuration builder
    pub fn builder() -> PriceConfigBuilder {
        PriceConfigBuilder::default()
    }

    /// Load from `METAL_PRICE_API_KEY`, `FOREX_RATE_API_KEY`,
    /// `PRICE_CACHE_TTL_SECONDS` and `PRICE_REQUEST_TIMEOUT_SECONDS`
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder().with_env_api_keys();
        if let Some(secs) = env_var::<u64>("PRICE_CACHE_TTL_SECONDS")? {
            builder = builder.cache_ttl(Duration::from_secs(secs));
        }
        if let Some(secs) = env_var::<u64>("PRICE_REQUEST_TIMEOUT_SECONDS")? {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            return Err(PriceError::Config(
                "request_timeout must be greater than 0".to_string(),
            ));
        }
        if self.rate_limit_per_minute == 0 {
            return Err(PriceError::Config(
                "rate_limit_per_minute must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for PriceConfig
#[derive(Debug, Default)]
pub struct PriceConfigBuilder {
    cache_ttl: Option<Duration>,
    request_timeout: Option<Duration>,
    rate_limit_per_minute: Option<u32>,
    metal_api_key: Option<String>,
    forex_api_key: Option<String>,
    metal_base_url: Option<String>,
    forex_base_url: Option<String>,
}

impl PriceConfigBuilder {
    /// Set cache TTL for quotes
    pub fn cache_ttl(mut self, duration: Duration) -> Self {
        self.cache_ttl = Some(duration);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    pub fn rate_limit_per_minute(mut self, limit: u32) -> Self {
        self.rate_limit_per_minute = Some(limit);
        self
    }

    pub fn metal_api_key(mut self, key: impl Into<String>) -> Self {
        self.metal_api_key = Some(key.into());
        self
    }

    pub fn forex_api_key(mut self, key: impl Into<String>) -> Self {
        self.forex_api_key = Some(key.into());
        self
    }

    pub fn metal_base_url(mut self, url: impl Into<String>) -> Self {
        self.metal_base_url = Some(url.into());
        self
    }

    pub fn forex_base_url(mut self, url: impl Into<String>) -> Self {
        self.forex_base_url = Some(url.into());
        self
    }

    /// Load API keys from environment
    pub fn with_env_api_keys(mut self) -> Self {
        if let Ok(key) = std::env::var("METAL_PRICE_API_KEY") {
            if !key.trim().is_empty() {
                self.metal_api_key = Some(key);
            }
        }
        if let Ok(key) = std::env::var("FOREX_RATE_API_KEY") {
            if !key.trim().is_empty() {
                self.forex_api_key = Some(key);
            }
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<PriceConfig> {
        let defaults = PriceConfig::default();

        let config = PriceConfig {
            cache_ttl: self.cache_ttl.unwrap_or(defaults.cache_ttl),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            rate_limit_per_minute: self
                .rate_limit_per_minute
                .unwrap_or(defaults.rate_limit_per_minute),
            metal_api_key: self.metal_api_key,
            forex_api_key: self.forex_api_key,
            metal_base_url: self.metal_base_url.unwrap_or(defaults.metal_base_url),
            forex_base_url: self.forex_base_url.unwrap_or(defaults.forex_base_url),
        };

        config.validate()?;
        Ok(config)
    }
}
