//! Anthropic messages API client
//!
//! See: https://docs.anthropic.com/en/api/messages

use std::time::Duration;

use async_trait::async_trait;
use forex_utils::env_var;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    CompletionRequest, CompletionResponse, ContentBlock, LLMError, LLMProvider, Message, Result,
    Role, StopReason, TokenUsage,
};

const API_ROOT: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_timeout(api_key, REQUEST_TIMEOUT)
    }

    /// Provider whose HTTP calls give up after `timeout`
    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LLMError::InvalidConfig(format!("{API_KEY_VAR} is empty")));
        }
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            base_url: API_ROOT.to_string(),
        })
    }

    /// Read the key from `ANTHROPIC_API_KEY`
    pub fn from_env() -> Result<Self> {
        let key: String = env_var(API_KEY_VAR)?.ok_or(LLMError::MissingCredentials(API_KEY_VAR))?;
        Self::new(key)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [Message],
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

impl<'a> From<&'a CompletionRequest> for MessagesBody<'a> {
    fn from(request: &'a CompletionRequest) -> Self {
        Self {
            model: &request.model,
            system: request.system.as_deref(),
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<StopReason>,
    usage: TokenUsage,
}

impl From<MessagesReply> for CompletionResponse {
    fn from(reply: MessagesReply) -> Self {
        Self {
            message: Message {
                role: Role::Assistant,
                content: reply.content,
            },
            stop_reason: reply.stop_reason.unwrap_or_default(),
            usage: reply.usage,
        }
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    #[instrument(skip_all, fields(model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        request.validate()?;

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&MessagesBody::from(&request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(LLMError::from_status(status.as_u16(), body));
        }

        let reply: MessagesReply = serde_json::from_slice(&response.bytes().await?)?;
        debug!(
            stop_reason = ?reply.stop_reason,
            input_tokens = reply.usage.input_tokens,
            output_tokens = reply.usage.output_tokens,
            "Anthropic reply"
        );
        Ok(reply.into())
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LlmConfig;

    #[test]
    fn test_blank_key_rejected() {
        assert!(matches!(
            AnthropicProvider::new("  "),
            Err(LLMError::InvalidConfig(_))
        ));
        assert_eq!(AnthropicProvider::new("sk-test").unwrap().name(), "anthropic");
    }

    #[test]
    fn test_body_omits_missing_system() {
        let mut request = CompletionRequest::ask(&LlmConfig::default(), "s", "GBP/USD?");
        request.system = None;
        let body = serde_json::to_value(MessagesBody::from(&request)).unwrap();

        assert!(body.get("system").is_none());
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["messages"][0]["content"][0]["text"], "GBP/USD?");
    }

    #[test]
    fn test_reply_conversion() {
        let reply: MessagesReply = serde_json::from_value(serde_json::json!({
            "id": "msg_01",
            "content": [{"type": "text", "text": "{\"signal\": \"hold\"}"}],
            "stop_reason": "max_tokens",
            "usage": {"input_tokens": 310, "output_tokens": 42}
        }))
        .unwrap();

        let response = CompletionResponse::from(reply);
        assert!(response.is_truncated());
        assert_eq!(response.usage.total(), 352);
        assert_eq!(response.text(), "{\"signal\": \"hold\"}");
    }
}
