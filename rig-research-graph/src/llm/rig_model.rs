//! Rig agent bridge
//!
//! `RigModel` wraps a Rig `Agent<M>` so any of Rig's completion providers
//! (OpenAI, Ollama, ...) can serve as the research workflow's model.
//!
//! ```rust,ignore
//! use rig::client::{CompletionClient, ProviderClient};
//! use rig::providers::openai::Client;
//! use rig_research_graph::llm::RigModel;
//!
//! let agent = Client::from_env().agent("gpt-4o").temperature(0.0).build();
//! let model = RigModel::with_names(agent, "openai", "gpt-4o");
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use rig::agent::Agent;
use rig::completion::{Completion, CompletionModel, Message as RigMessage};
use rig::message::AssistantContent;
use rig::OneOrMany;

use super::config::{LLMConfig, TokenUsage};
use super::provider::{LLMProvider, LLMResponse};
use crate::error::ModelError;
use crate::state::{Message, Role};

/// `LLMProvider` backed by a Rig agent.
pub struct RigModel<M>
where
    M: CompletionModel + Send + Sync,
{
    agent: Arc<Agent<M>>,
    provider_name: String,
    model_name: String,
    request_timeout: Option<Duration>,
}

impl<M> RigModel<M>
where
    M: CompletionModel + Send + Sync,
{
    pub fn new(agent: Agent<M>) -> Self {
        Self::with_names(agent, "rig", "rig-agent")
    }

    /// Create with provider/model names used in logs.
    pub fn with_names(
        agent: Agent<M>,
        provider_name: impl Into<String>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            agent: Arc::new(agent),
            provider_name: provider_name.into(),
            model_name: model_name.into(),
            request_timeout: None,
        }
    }

    /// Default upper bound for a completion; `LLMConfig::request_timeout` overrides it.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn agent(&self) -> &Agent<M> {
        &self.agent
    }

    async fn send(
        &self,
        conversation: RigConversation,
        config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, ModelError> {
        let mut builder = self
            .agent
            .completion(conversation.prompt, conversation.history)
            .await
            .map_err(|e| ModelError::classify(e.to_string()))?;

        if let Some(system_preamble) = conversation.preamble {
            let preamble = match self.agent.preamble.as_deref() {
                Some(agent_preamble) => format!("{}\n\n{}", agent_preamble, system_preamble),
                None => system_preamble,
            };
            builder = builder.preamble(preamble);
        }

        if let Some(cfg) = config {
            if let Some(temperature) = cfg.temperature {
                builder = builder.temperature(temperature);
            }
            if let Some(max_tokens) = cfg.max_tokens {
                builder = builder.max_tokens(max_tokens);
            }
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ModelError::classify(e.to_string()))?;

        let message = message_from_rig_choice(&response.choice);
        let usage = TokenUsage::from_rig_usage(&response.usage);

        let mut llm_response = LLMResponse::new(message);
        if !usage.is_empty() {
            llm_response = llm_response.with_usage(usage);
        }
        Ok(llm_response)
    }
}

#[async_trait]
impl<M> LLMProvider for RigModel<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    async fn complete(
        &self,
        messages: &[Message],
        config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, ModelError> {
        let conversation = build_rig_conversation(messages);
        let limit = config
            .and_then(|cfg| cfg.request_timeout)
            .or(self.request_timeout);

        tracing::debug!(
            provider = %self.provider_name,
            model = %self.model_name,
            messages = messages.len(),
            "Sending completion request"
        );

        match limit {
            Some(limit) => tokio::time::timeout(limit, self.send(conversation, config))
                .await
                .map_err(|_| ModelError::Timeout(format!("no response within {limit:?}")))?,
            None => self.send(conversation, config).await,
        }
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn default_model(&self) -> &str {
        &self.model_name
    }
}

struct RigConversation {
    prompt: RigMessage,
    history: Vec<RigMessage>,
    preamble: Option<String>,
}

/// System messages become the preamble, the last message the prompt,
/// everything in between the chat history.
fn build_rig_conversation(messages: &[Message]) -> RigConversation {
    let mut system_parts = Vec::new();
    let mut rig_messages = Vec::new();

    for message in messages {
        match message.role {
            Role::System => {
                if !message.content.trim().is_empty() {
                    system_parts.push(message.content.clone());
                }
            }
            Role::User => rig_messages.push(RigMessage::user(message.content.clone())),
            Role::Assistant => rig_messages.push(RigMessage::Assistant {
                id: None,
                content: OneOrMany::one(AssistantContent::text(message.content.clone())),
            }),
        }
    }

    let prompt = rig_messages.pop().unwrap_or_else(|| RigMessage::user(""));

    let preamble = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };

    RigConversation {
        prompt,
        history: rig_messages,
        preamble,
    }
}

fn message_from_rig_choice(choice: &OneOrMany<AssistantContent>) -> Message {
    let content: String = choice
        .iter()
        .filter_map(|item| match item {
            AssistantContent::Text(text) => Some(text.text.as_str()),
            _ => None,
        })
        .collect();
    Message::assistant(content)
}

impl<M> std::fmt::Debug for RigModel<M>
where
    M: CompletionModel + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RigModel")
            .field("provider_name", &self.provider_name)
            .field("model_name", &self.model_name)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
