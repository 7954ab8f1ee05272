//! # Collaborator Wiring
//!
//! Builds the model and retrieval collaborators the research workflow
//! runs against, from the loaded [`Config`].

use anyhow::{Context, Result};
use rig::client::{CompletionClient, ProviderClient};
use rig::providers::{ollama, openai};
use std::sync::Arc;
use tracing::{debug, info};

use rig_research_graph::llm::{LLMConfig, LLMProvider, RetryingProvider, RigModel};
use rig_research_graph::pregel::{PregelConfig, RetryPolicy};
use rig_research_graph::research::{ResearchConfig, ResearchContext};
use rig_research_graph::tools::{TavilySearch, WikipediaSearch};

use crate::config::{Config, Provider};

/// Transient model failures (timeouts, rate limits) are retried this many times
const MODEL_RETRIES: usize = 3;

/// Create the completion model for the configured provider, with retries.
pub fn build_model(config: &Config) -> Result<Arc<dyn LLMProvider>> {
    let model: Arc<dyn LLMProvider> = match config.provider {
        Provider::OpenAi => {
            if std::env::var("OPENAI_API_KEY").is_err() {
                anyhow::bail!("OPENAI_API_KEY is not set");
            }
            let client = openai::Client::from_env();
            let agent = client.agent(&config.model).build();
            Arc::new(
                RigModel::with_names(agent, "openai", &config.model)
                    .with_request_timeout(config.request_timeout),
            )
        }
        Provider::Ollama => {
            std::env::set_var("OLLAMA_API_BASE_URL", &config.ollama_host);
            let client = ollama::Client::from_env();
            debug!(host = %config.ollama_host, "Connected to Ollama");
            let agent = client.agent(&config.model).build();
            Arc::new(
                RigModel::with_names(agent, "ollama", &config.model)
                    .with_request_timeout(config.request_timeout),
            )
        }
    };

    info!(provider = %config.provider, model = %config.model, "Model configured");
    Ok(Arc::new(RetryingProvider::new(model, RetryPolicy::new(MODEL_RETRIES))))
}

/// Workflow settings derived from the CLI configuration
pub fn research_config(config: &Config) -> ResearchConfig {
    ResearchConfig::default()
        .with_max_num_turns(config.max_num_turns)
        .with_llm_config(LLMConfig::new(&config.model).with_temperature(config.temperature))
        .with_engine(engine_config(config))
}

/// The run as a whole must outlast its slowest node.
fn engine_config(config: &Config) -> PregelConfig {
    let engine = PregelConfig::default();
    let workflow_timeout = engine.workflow_timeout.max(config.node_timeout);
    engine
        .with_vertex_timeout(config.node_timeout)
        .with_workflow_timeout(workflow_timeout)
}

/// Model, web search (Tavily) and encyclopedia (Wikipedia) collaborators.
pub fn build_context(config: &Config) -> Result<Arc<ResearchContext>> {
    let llm = build_model(config)?;
    let web = TavilySearch::from_env().context("Web search needs TAVILY_API_KEY")?;
    let encyclopedia = WikipediaSearch::new();

    Ok(Arc::new(
        ResearchContext::new(llm, Arc::new(web), Arc::new(encyclopedia))
            .with_config(research_config(config)),
    ))
}
