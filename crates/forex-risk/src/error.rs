//! Error types for risk computation

use thiserror::Error;

/// Failures that prevent the gate from producing an assessment at all.
///
/// A rejected trade is not an error; it is a normal
/// [`RiskAssessment`](forex_core::RiskAssessment) with `approved == false`.
#[derive(Debug, Error)]
pub enum RiskError {
    /// Risk settings are out of range
    #[error("Invalid risk configuration: {0}")]
    InvalidConfig(String),

    /// Environment configuration could not be read
    #[error(transparent)]
    Env(#[from] forex_utils::ConfigError),

    /// No usable technical result to size the trade from
    #[error("Technical analysis unavailable: {0}")]
    TechnicalUnavailable(String),

    /// The technical result lacks a level the gate needs
    #[error("Missing trade level: {0}")]
    MissingLevel(&'static str),
}

/// Result type alias for risk operations
pub type Result<T> = std::result::Result<T, RiskError>;

impl From<RiskError> for forex_core::Error {
    fn from(err: RiskError) -> Self {
        match err {
            RiskError::InvalidConfig(msg) => {
                forex_core::Error::Config(forex_utils::ConfigError::Invalid(msg))
            }
            RiskError::Env(e) => forex_core::Error::Config(e),
            other => forex_core::Error::Generic(other.to_string()),
        }
    }
}
