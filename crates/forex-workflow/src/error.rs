//! Error types for the analysis pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that abort a run.
///
/// Provider failures and risk rejections are not errors; they are recorded
/// in the [`AnalysisState`](forex_core::AnalysisState) and the run goes on.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Pipeline settings are out of range
    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// The pipeline builder is missing a component
    #[error("Pipeline is missing a component: {0}")]
    MissingComponent(&'static str),

    /// Risk settings could not be resolved for this run
    #[error(transparent)]
    Risk(#[from] forex_risk::RiskError),

    /// Environment configuration could not be read
    #[error(transparent)]
    Env(#[from] forex_utils::ConfigError),

    /// Price service could not be constructed
    #[error(transparent)]
    Prices(#[from] forex_prices::PriceError),

    /// A stage broke a state invariant
    #[error(transparent)]
    State(#[from] forex_core::Error),
}

impl From<PipelineError> for forex_core::Error {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::State(e) => e,
            PipelineError::Env(e) => forex_core::Error::Config(e),
            PipelineError::Risk(e) => e.into(),
            PipelineError::Prices(e) => e.into(),
            other => forex_core::Error::Generic(other.to_string()),
        }
    }
}
