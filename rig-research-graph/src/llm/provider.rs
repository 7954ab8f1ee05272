//! LLM Provider trait definition
//!
//! The model-invocation collaborator: a conversation in, an assistant
//! message out. Implementations bridge to Rig completion models.

use async_trait::async_trait;

use super::config::{LLMConfig, TokenUsage};
use crate::error::ModelError;
use crate::state::Message;

/// LLM completion response
#[derive(Debug, Clone)]
pub struct LLMResponse {
    /// The assistant's response message
    pub message: Message,
    /// Token usage statistics (if reported by the provider)
    pub usage: Option<TokenUsage>,
}

impl LLMResponse {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Core LLM Provider trait
///
/// ```rust,ignore
/// #[async_trait]
/// impl LLMProvider for EchoModel {
///     async fn complete(
///         &self,
///         messages: &[Message],
///         _config: Option<&LLMConfig>,
///     ) -> Result<LLMResponse, ModelError> {
///         let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
///         Ok(LLMResponse::new(Message::assistant(last)))
///     }
///
///     fn name(&self) -> &str { "echo" }
///     fn default_model(&self) -> &str { "echo-1" }
/// }
/// ```
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion for `messages`
    async fn complete(
        &self,
        messages: &[Message],
        config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, ModelError>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Default model identifier for this provider
    fn default_model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Role;

    struct EchoProvider;

    #[async_trait]
    impl LLMProvider for EchoProvider {
        async fn complete(
            &self,
            messages: &[Message],
            _config: Option<&LLMConfig>,
        ) -> Result<LLMResponse, ModelError> {
            let last = messages
                .last()
                .map(|m| m.content.clone())
                .ok_or_else(|| ModelError::Validation("empty conversation".into()))?;
            Ok(LLMResponse::new(Message::assistant(format!("echo: {last}")))
                .with_usage(TokenUsage::new(3, 2)))
        }

        fn name(&self) -> &str {
            "echo"
        }

        fn default_model(&self) -> &str {
            "echo-1"
        }
    }

    #[tokio::test]
    async fn test_provider_complete() {
        let provider = EchoProvider;
        let response = provider
            .complete(&[Message::user("hi")], None)
            .await
            .unwrap();

        assert_eq!(response.message.role, Role::Assistant);
        assert_eq!(response.message.content, "echo: hi");
        assert_eq!(response.usage.unwrap().total_tokens, 5);
    }

    #[tokio::test]
    async fn test_provider_error() {
        let err = EchoProvider.complete(&[], None).await.unwrap_err();
        assert!(matches!(err, ModelError::Validation(_)));
    }
}
