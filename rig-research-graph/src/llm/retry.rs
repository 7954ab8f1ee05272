//! Retrying decorator for model providers
//!
//! Transient model failures (timeouts, rate limits) are retried with the
//! same exponential backoff the Pregel runtime uses for vertices.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use super::config::LLMConfig;
use super::provider::{LLMProvider, LLMResponse};
use crate::error::ModelError;
use crate::pregel::RetryPolicy;
use crate::state::Message;

/// Wraps a provider and retries transient failures.
pub struct RetryingProvider {
    inner: Arc<dyn LLMProvider>,
    policy: RetryPolicy,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn LLMProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl LLMProvider for RetryingProvider {
    async fn complete(
        &self,
        messages: &[Message],
        config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, ModelError> {
        let mut attempts = 0;
        loop {
            match self.inner.complete(messages, config).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && self.policy.should_retry(attempts) => {
                    let delay = self.policy.delay_for_attempt(attempts);
                    attempts += 1;
                    warn!(
                        provider = self.inner.name(),
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient model failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn default_model(&self) -> &str {
        self.inner.default_model()
    }
}
