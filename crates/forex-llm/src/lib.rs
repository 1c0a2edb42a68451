//! Model access for the forex analysts
//!
//! A provider answers one [`CompletionRequest`] at a time. The Anthropic
//! client is built with the default `anthropic` feature; everything else is
//! provider-agnostic so offline fakes can stand in for it.

pub mod completion;
pub mod config;
pub mod error;
pub mod messages;
pub mod provider;

#[cfg(feature = "anthropic")]
mod anthropic;

pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use config::LlmConfig;
pub use error::{LLMError, Result};
pub use messages::{ContentBlock, Message, Role};
pub use provider::LLMProvider;

#[cfg(feature = "anthropic")]
pub use anthropic::AnthropicProvider;
