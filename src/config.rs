//! # Configuration Module
//!
//! Loads settings from environment variables (and a `.env` file when
//! present). Command-line flags in `main.rs` override these values.

use anyhow::{Context, Result};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// PROVIDER
// =============================================================================
/// Which LLM backend drives the research workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// OpenAI API (`OPENAI_API_KEY`)
    OpenAi,
    /// Local Ollama server
    Ollama,
}

impl Provider {
    pub fn default_model(self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4.1",
            Provider::Ollama => "llama3.2",
        }
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "ollama" => Ok(Provider::Ollama),
            other => anyhow::bail!("Unknown LLM provider '{other}' (expected 'openai' or 'ollama')"),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAi => write!(f, "openai"),
            Provider::Ollama => write!(f, "ollama"),
        }
    }
}

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================
/// Settings for one research run.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: Provider,

    /// Model name; defaults to the provider's default model
    pub model: String,

    /// Ollama server URL (default: http://localhost:11434)
    pub ollama_host: String,

    /// Sampling temperature for every model call
    pub temperature: f64,

    /// Upper bound on generated analysts
    pub max_analysts: usize,

    /// Expert answers per interview
    pub max_num_turns: usize,

    /// Upper bound for one graph node; an interview runs as a single node
    pub node_timeout: Duration,

    /// Upper bound for a single model request
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            model: Provider::OpenAi.default_model().to_string(),
            ollama_host: "http://localhost:11434".to_string(),
            temperature: 0.0,
            max_analysts: 3,
            max_num_turns: 2,
            node_timeout: Duration::from_secs(900),
            request_timeout: Duration::from_secs(120),
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================
impl Config {
    /// Load configuration from environment variables.
    ///
    /// Recognized: `LLM_PROVIDER`, `LLM_MODEL` (or `OPENAI_MODEL` /
    /// `OLLAMA_MODEL` for the selected provider), `OLLAMA_API_BASE_URL`,
    /// `TEMPERATURE`, `MAX_ANALYSTS`, `MAX_NUM_TURNS`, `NODE_TIMEOUT_SECS`,
    /// `REQUEST_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (silently ignore if not found)
        let _ = dotenvy::dotenv();

        let mut config = Config::default();

        if let Ok(val) = env::var("LLM_PROVIDER") {
            config.set_provider(val.parse()?);
        }

        let provider_model = match config.provider {
            Provider::OpenAi => "OPENAI_MODEL",
            Provider::Ollama => "OLLAMA_MODEL",
        };
        if let Ok(val) = env::var(provider_model) {
            config.model = val;
        }

        // LLM_MODEL wins over the provider-specific variable
        if let Ok(val) = env::var("LLM_MODEL") {
            config.model = val;
        }

        if let Ok(val) = env::var("OLLAMA_API_BASE_URL") {
            config.ollama_host = val;
        }

        if let Ok(val) = env::var("TEMPERATURE") {
            config.temperature = val
                .parse()
                .context("TEMPERATURE must be a valid floating-point number (e.g., 0.2)")?;
        }

        if let Ok(val) = env::var("MAX_ANALYSTS") {
            config.max_analysts = val
                .parse()
                .context("MAX_ANALYSTS must be a valid positive integer")?;
        }

        if let Ok(val) = env::var("MAX_NUM_TURNS") {
            config.max_num_turns = val
                .parse()
                .context("MAX_NUM_TURNS must be a valid positive integer")?;
        }

        if let Ok(val) = env::var("NODE_TIMEOUT_SECS") {
            let secs: u64 = val
                .parse()
                .context("NODE_TIMEOUT_SECS must be a whole number of seconds")?;
            config.node_timeout = Duration::from_secs(secs);
        }

        if let Ok(val) = env::var("REQUEST_TIMEOUT_SECS") {
            let secs: u64 = val
                .parse()
                .context("REQUEST_TIMEOUT_SECS must be a whole number of seconds")?;
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Switch provider, keeping a custom model but replacing the previous default.
    pub fn set_provider(&mut self, provider: Provider) {
        if self.model == self.provider.default_model() {
            self.model = provider.default_model().to_string();
        }
        self.provider = provider;
    }

    /// Validate the configuration before any network call is made.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!(
                "Temperature must be between 0.0 and 2.0, got: {}",
                self.temperature
            );
        }

        if self.max_analysts == 0 {
            anyhow::bail!("MAX_ANALYSTS must be at least 1");
        }

        if self.max_num_turns == 0 {
            anyhow::bail!("MAX_NUM_TURNS must be at least 1");
        }

        if self.model.is_empty() {
            anyhow::bail!("LLM_MODEL cannot be empty");
        }

        if self.request_timeout > self.node_timeout {
            anyhow::bail!(
                "REQUEST_TIMEOUT_SECS ({:?}) cannot exceed NODE_TIMEOUT_SECS ({:?})",
                self.request_timeout,
                self.node_timeout
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.provider, Provider::OpenAi);
        assert_eq!(config.model, "gpt-4.1");
        assert_eq!(config.max_analysts, 3);
        assert_eq!(config.max_num_turns, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!(" ollama ".parse::<Provider>().unwrap(), Provider::Ollama);
        assert!("claude".parse::<Provider>().is_err());
        assert_eq!(Provider::Ollama.to_string(), "ollama");
    }

    #[test]
    fn test_set_provider_replaces_default_model_only() {
        let mut config = Config::default();
        config.set_provider(Provider::Ollama);
        assert_eq!(config.model, "llama3.2");

        config.model = "qwen3".into();
        config.set_provider(Provider::OpenAi);
        assert_eq!(config.model, "qwen3");
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.temperature = 3.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.max_analysts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.max_num_turns = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model = String::new();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.request_timeout = Duration::from_secs(1000);
        assert!(config.validate().is_err());
    }
}
