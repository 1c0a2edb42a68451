//! Single-shot completion requests
//!
//! Every model call made by the analysts is one system prompt plus one user
//! prompt, answered by one assistant turn.

use serde::{Deserialize, Serialize};

use crate::{LLMError, LlmConfig, Message, Result, Role};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub max_tokens: usize,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// One question under `system`, with model and limits from `config`
    pub fn ask(config: &LlmConfig, system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: config.model.clone(),
            system: Some(system.into()),
            messages: vec![Message::user(prompt)],
            max_tokens: config.max_tokens,
            temperature: Some(config.temperature),
        }
    }

    /// Reject requests the API would refuse anyway
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(LLMError::InvalidRequest("model is empty".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(LLMError::InvalidRequest("max_tokens is 0".to_string()));
        }
        match self.messages.first() {
            None => Err(LLMError::InvalidRequest("no messages".to_string())),
            Some(first) if first.role != Role::User => Err(LLMError::InvalidRequest(
                "conversation must open with a user turn".to_string(),
            )),
            Some(_) => Ok(()),
        }
    }
}

/// Why the model stopped writing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    #[default]
    EndTurn,
    MaxTokens,
    StopSequence,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl TokenUsage {
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub message: Message,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

impl CompletionResponse {
    /// Plain assistant reply, as produced by offline providers
    pub fn text_reply(text: impl Into<String>) -> Self {
        Self {
            message: Message::assistant(text),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        }
    }

    pub fn text(&self) -> String {
        self.message.text()
    }

    /// JSON answers cut off at the token limit will not decode
    pub fn is_truncated(&self) -> bool {
        self.stop_reason == StopReason::MaxTokens
    }
}
