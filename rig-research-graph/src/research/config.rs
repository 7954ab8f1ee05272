//! Research workflow configuration and collaborators

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::state::DEFAULT_MAX_NUM_TURNS;
use crate::llm::{LLMConfig, LLMProvider};
use crate::pregel::PregelConfig;
use crate::tools::{EncyclopediaSearch, WebSearch};

/// Share of the engine's vertex timeout one interview may use at most
const INTERVIEW_SHARE: f64 = 0.9;

/// Tunables for the research and interview graphs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Expert answers per interview before it is saved
    pub max_num_turns: usize,

    /// Web hits requested per search
    pub web_max_results: usize,

    /// Encyclopedia articles requested per lookup
    pub encyclopedia_max_docs: usize,

    /// Name tag carried by expert answers
    pub expert_name: String,

    /// Per-request model settings, if any
    #[serde(default)]
    pub llm: Option<LLMConfig>,

    /// Engine settings shared by both graphs
    #[serde(default)]
    pub engine: PregelConfig,

    /// Time budget for one interview; see `interview_budget`
    #[serde(default, with = "humantime_serde")]
    pub interview_timeout: Option<Duration>,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_num_turns: DEFAULT_MAX_NUM_TURNS,
            web_max_results: 3,
            encyclopedia_max_docs: 2,
            expert_name: "expert".to_string(),
            llm: None,
            engine: PregelConfig::default(),
            interview_timeout: None,
        }
    }
}

impl ResearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_num_turns(mut self, turns: usize) -> Self {
        self.max_num_turns = turns;
        self
    }

    pub fn with_web_max_results(mut self, max: usize) -> Self {
        self.web_max_results = max;
        self
    }

    pub fn with_encyclopedia_max_docs(mut self, max: usize) -> Self {
        self.encyclopedia_max_docs = max;
        self
    }

    pub fn with_expert_name(mut self, name: impl Into<String>) -> Self {
        self.expert_name = name.into();
        self
    }

    pub fn with_llm_config(mut self, config: LLMConfig) -> Self {
        self.llm = Some(config);
        self
    }

    pub fn with_engine(mut self, engine: PregelConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_interview_timeout(mut self, limit: Duration) -> Self {
        self.interview_timeout = Some(limit);
        self
    }

    /// Every interview runs inside the single `conduct_interview` vertex, so
    /// each one gets a budget strictly below the engine's `vertex_timeout`.
    pub fn interview_budget(&self) -> Duration {
        let ceiling = self.engine.vertex_timeout.mul_f64(INTERVIEW_SHARE);
        self.interview_timeout.map_or(ceiling, |limit| limit.min(ceiling))
    }

    /// Engine settings for the interview sub-graph, bounded by the budget
    pub fn interview_engine(&self) -> PregelConfig {
        let budget = self.interview_budget();
        self.engine
            .clone()
            .with_vertex_timeout(self.engine.vertex_timeout.min(budget))
            .with_workflow_timeout(budget)
    }
}

/// Collaborators and settings handed to every node
#[derive(Clone)]
pub struct ResearchContext {
    pub llm: Arc<dyn LLMProvider>,
    pub web: Arc<dyn WebSearch>,
    pub encyclopedia: Arc<dyn EncyclopediaSearch>,
    pub config: ResearchConfig,
}

impl ResearchContext {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        web: Arc<dyn WebSearch>,
        encyclopedia: Arc<dyn EncyclopediaSearch>,
    ) -> Self {
        Self {
            llm,
            web,
            encyclopedia,
            config: ResearchConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ResearchConfig) -> Self {
        self.config = config;
        self
    }

    pub(crate) fn llm_config(&self) -> Option<&LLMConfig> {
        self.config.llm.as_ref()
    }
}

impl std::fmt::Debug for ResearchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchContext")
            .field("llm", &self.llm.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
