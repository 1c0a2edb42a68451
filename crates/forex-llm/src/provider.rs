use async_trait::async_trait;

use crate::{CompletionRequest, CompletionResponse, Result};

/// A hosted or local model that answers completion requests
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Short identifier used in logs and error messages
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LLMError, LlmConfig};

    #[tokio::test]
    async fn test_mock_provider_behind_trait_object() {
        let mut mock = MockLLMProvider::new();
        mock.expect_name().return_const("mock".to_string());
        mock.expect_complete()
            .withf(|request| request.messages.len() == 1)
            .times(2)
            .returning(|request| {
                if request.max_tokens < 100 {
                    Err(LLMError::from_status(503, "overloaded".to_string()))
                } else {
                    let reply = format!("model {}", request.model);
                    Ok(CompletionResponse::text_reply(reply))
                }
            });

        let provider: Box<dyn LLMProvider> = Box::new(mock);
        let config = LlmConfig::default().with_model("claude-test");
        let response = provider
            .complete(CompletionRequest::ask(&config, "s", "EUR/CHF?"))
            .await
            .unwrap();
        assert_eq!(response.text(), "model claude-test");

        let tiny = LlmConfig {
            max_tokens: 10,
            ..config
        };
        let err = provider
            .complete(CompletionRequest::ask(&tiny, "s", "EUR/CHF?"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(provider.name(), "mock");
    }
}
