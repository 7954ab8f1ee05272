//! In-memory collaborators for tests and offline runs
//!
//! - [`ScriptedModel`]: replays queued replies, or answers through a closure
//! - [`StubWeb`] / [`StubEncyclopedia`]: fixed retrieval results
//!
//! Every stub records the requests it received.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{ModelError, RetrievalError};
use crate::llm::{LLMConfig, LLMProvider, LLMResponse};
use crate::research::{ResearchConfig, ResearchContext};
use crate::state::Message;
use crate::tools::{EncyclopediaDocument, EncyclopediaSearch, WebDocument, WebSearch};

type Responder = dyn Fn(&[Message]) -> Result<String, ModelError> + Send + Sync;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Model that replays a script
///
/// Queued replies are used first; once they run out the responder (if any)
/// answers, otherwise the call fails with `ModelError::Provider`.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
    responder: Option<Box<Responder>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new<I, T>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::with_results(replies.into_iter().map(|r| Ok(r.into())))
    }

    /// Queue of successes and failures, in call order
    pub fn with_results(results: impl IntoIterator<Item = Result<String, ModelError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(results.into_iter().collect()),
            responder: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Every call fails with `error`
    pub fn failing(error: ModelError) -> Arc<Self> {
        Self::responder(move |_| Err(error.clone()))
    }

    /// Answer each call from the request itself (order-independent)
    pub fn responder(
        f: impl Fn(&[Message]) -> Result<String, ModelError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            responder: Some(Box::new(f)),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Conversations received so far
    pub fn requests(&self) -> Vec<Vec<Message>> {
        lock(&self.requests).clone()
    }

    pub fn calls(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl LLMProvider for ScriptedModel {
    async fn complete(
        &self,
        messages: &[Message],
        _config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, ModelError> {
        lock(&self.requests).push(messages.to_vec());

        let queued = lock(&self.replies).pop_front();
        let reply = match (queued, &self.responder) {
            (Some(reply), _) => reply,
            (None, Some(responder)) => responder(messages),
            (None, None) => Err(ModelError::Provider("script exhausted".to_string())),
        }?;
        Ok(LLMResponse::new(Message::assistant(reply)))
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted"
    }
}

/// Web search with fixed hits
pub struct StubWeb {
    result: Result<Vec<WebDocument>, RetrievalError>,
    queries: Mutex<Vec<(String, usize)>>,
}

impl StubWeb {
    pub fn with_docs(docs: Vec<WebDocument>) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(docs),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn empty() -> Arc<Self> {
        Self::with_docs(Vec::new())
    }

    pub fn failing(error: RetrievalError) -> Arc<Self> {
        Arc::new(Self {
            result: Err(error),
            queries: Mutex::new(Vec::new()),
        })
    }

    /// `(query, max_results)` of every call
    pub fn queries(&self) -> Vec<(String, usize)> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl WebSearch for StubWeb {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<WebDocument>, RetrievalError> {
        lock(&self.queries).push((query.to_string(), max_results));
        self.result
            .as_ref()
            .map(|docs| docs.iter().take(max_results).cloned().collect())
            .map_err(Clone::clone)
    }
}

/// Encyclopedia lookup with fixed articles
pub struct StubEncyclopedia {
    result: Result<Vec<EncyclopediaDocument>, RetrievalError>,
    queries: Mutex<Vec<(String, usize)>>,
}

impl StubEncyclopedia {
    pub fn with_docs(docs: Vec<EncyclopediaDocument>) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(docs),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn empty() -> Arc<Self> {
        Self::with_docs(Vec::new())
    }

    pub fn failing(error: RetrievalError) -> Arc<Self> {
        Arc::new(Self {
            result: Err(error),
            queries: Mutex::new(Vec::new()),
        })
    }

    /// `(query, max_docs)` of every call
    pub fn queries(&self) -> Vec<(String, usize)> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl EncyclopediaSearch for StubEncyclopedia {
    async fn search(
        &self,
        query: &str,
        max_docs: usize,
    ) -> Result<Vec<EncyclopediaDocument>, RetrievalError> {
        lock(&self.queries).push((query.to_string(), max_docs));
        self.result
            .as_ref()
            .map(|docs| docs.iter().take(max_docs).cloned().collect())
            .map_err(Clone::clone)
    }
}

/// Research context over the given stubs with default settings
pub fn context_with(
    model: Arc<ScriptedModel>,
    web: Arc<StubWeb>,
    encyclopedia: Arc<StubEncyclopedia>,
) -> Arc<ResearchContext> {
    Arc::new(
        ResearchContext::new(model, web, encyclopedia).with_config(ResearchConfig::default()),
    )
}
