//! LLM configuration types
//!
//! Per-request settings and usage accounting for the model collaborator.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Token usage statistics from an LLM completion.
///
/// ```
/// use rig_research_graph::llm::TokenUsage;
///
/// let usage = TokenUsage::new(100, 50);
/// assert_eq!(usage.total_tokens, 150);
///
/// let total = usage + TokenUsage::new(200, 75);
/// assert_eq!(total.total_tokens, 425);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Create a new TokenUsage with calculated total
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input_tokens: input,
            output_tokens: output,
            total_tokens: input + output,
        }
    }

    /// Create from rig-core Usage struct
    pub fn from_rig_usage(usage: &rig::completion::Usage) -> Self {
        Self::new(usage.input_tokens, usage.output_tokens)
    }

    pub fn is_empty(&self) -> bool {
        self.total_tokens == 0
    }
}

impl std::ops::Add for TokenUsage {
    type Output = Self;

    fn add(mut self, other: Self) -> Self::Output {
        self += other;
        self
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Per-request model settings
///
/// ```
/// use rig_research_graph::llm::LLMConfig;
///
/// let config = LLMConfig::new("gpt-4o").with_temperature(0.0);
/// assert_eq!(config.temperature, Some(0.0));
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Model identifier (e.g. "gpt-4o", "llama3.1")
    pub model: String,
    /// Sampling temperature (0.0 - 2.0)
    pub temperature: Option<f64>,
    /// Maximum tokens to generate in the response
    pub max_tokens: Option<u64>,
    /// Upper bound for a single completion call
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<Duration>,
}

impl LLMConfig {
    /// Create a new configuration with the specified model
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, tokens: u64) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage_accumulates() {
        let mut usage = TokenUsage::new(100, 50);
        usage += TokenUsage::new(50, 25);
        assert_eq!(usage, TokenUsage::new(150, 75));
        assert_eq!((usage + TokenUsage::default()).total_tokens, 225);
        assert!(TokenUsage::default().is_empty());
    }

    #[test]
    fn test_llm_config_builder() {
        let config = LLMConfig::new("gpt-4o")
            .with_temperature(0.7)
            .with_max_tokens(4096)
            .with_request_timeout(Duration::from_secs(30));

        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.temperature, Some(0.7));
        assert_eq!(config.max_tokens, Some(4096));
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_llm_config_serialization() {
        let config = LLMConfig::new("llama3.1").with_request_timeout(Duration::from_secs(90));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"request_timeout\":\"1m 30s\""));

        let bare = serde_json::to_string(&LLMConfig::new("llama3.1")).unwrap();
        assert!(!bare.contains("request_timeout"));

        let back: LLMConfig = serde_json::from_str(r#"{"model":"m","temperature":null,"max_tokens":null}"#).unwrap();
        assert_eq!(back.request_timeout, None);
    }
}
