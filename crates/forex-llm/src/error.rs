use forex_utils::ConfigError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LLMError>;

/// Failures talking to a model
#[derive(Error, Debug)]
pub enum LLMError {
    /// Credential environment variable is unset
    #[error("{0} is not set")]
    MissingCredentials(&'static str),

    #[error("invalid model settings: {0}")]
    InvalidConfig(String),

    /// Request rejected before or by the API as malformed
    #[error("invalid completion request: {0}")]
    InvalidRequest(String),

    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    /// Any other non-success HTTP status
    #[error("provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[cfg(feature = "anthropic")]
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode provider reply: {0}")]
    Decode(#[from] serde_json::Error),

    /// Failure reported by a provider that is not HTTP based
    #[error("{0}")]
    Provider(String),
}

impl LLMError {
    /// Classify a non-success status and its response body
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            400 | 413 | 422 => Self::InvalidRequest(body),
            429 => Self::RateLimited(body),
            _ => Self::Api {
                status,
                message: body,
            },
        }
    }

    /// Whether sending the same request again later could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited(_) => true,
            Self::Api { status, .. } => *status >= 500,
            #[cfg(feature = "anthropic")]
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

impl From<ConfigError> for LLMError {
    fn from(err: ConfigError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
