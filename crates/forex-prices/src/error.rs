//! Error types for price lookups

use std::time::Duration;

use thiserror::Error;

/// Price lookup errors
///
/// These stay inside the crate's upstream layer; [`PriceService`](crate::PriceService)
/// turns every one of them into [`Lookup::Unavailable`](crate::Lookup).
#[derive(Debug, Error)]
pub enum PriceError {
    /// Upstream answered with an error payload or status
    #[error("{provider} error: {message}")]
    Api {
        provider: &'static str,
        message: String,
    },

    /// Upstream answer did not contain the requested symbol
    #[error("{provider} returned no rate for {symbol}")]
    MissingRate {
        provider: &'static str,
        symbol: String,
    },

    /// Rate limit exceeded for API
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded { provider: &'static str },

    /// No API key configured for the source
    #[error("No API key configured for {0}")]
    MissingApiKey(&'static str),

    /// The call did not finish within its timeout
    #[error("Price lookup timed out after {0:?}")]
    Timeout(Duration),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Environment configuration could not be read
    #[error(transparent)]
    Env(#[from] forex_utils::ConfigError),
}

/// Result type alias for price operations
pub type Result<T> = std::result::Result<T, PriceError>;

impl From<PriceError> for forex_core::Error {
    fn from(err: PriceError) -> Self {
        match err {
            PriceError::Config(msg) => {
                forex_core::Error::Config(forex_utils::ConfigError::Invalid(msg))
            }
            PriceError::Env(e) => forex_core::Error::Config(e),
            other => forex_core::Error::ProviderFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PriceError::MissingRate {
            provider: "forexrateapi",
            symbol: "EUR".to_string(),
        };
        assert_eq!(err.to_string(), "forexrateapi returned no rate for EUR");

        let err = PriceError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "Price lookup timed out after 5s");
    }

    #[test]
    fn test_error_conversion() {
        let err: forex_core::Error = PriceError::MissingApiKey("metalpriceapi").into();
        assert!(
            matches!(err, forex_core::Error::ProviderFailed(ref m) if m.contains("metalpriceapi"))
        );
    }
}
