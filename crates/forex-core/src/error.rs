//! Error types for forex-core

use thiserror::Error;

/// Result type alias for forex-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Generic error message
    #[error("{0}")]
    Generic(String),

    /// A currency pair could not be parsed
    #[error("Invalid currency pair: {0}")]
    InvalidPair(String),

    /// A write-once state field was written a second time
    #[error("State field already set: {0}")]
    FieldAlreadySet(String),

    /// A task result did not satisfy the envelope contract
    #[error("Invalid task result: {0}")]
    InvalidTaskResult(String),

    /// A state update or stage transition broke a pipeline invariant
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    /// An analysis provider failed to produce a judgement
    #[error("Provider failed: {0}")]
    ProviderFailed(String),

    /// Provider output could not be decoded
    #[error("Failed to decode provider output: {0}")]
    Decode(#[from] serde_json::Error),

    /// Configuration could not be resolved
    #[error(transparent)]
    Config(#[from] forex_utils::ConfigError),
}
