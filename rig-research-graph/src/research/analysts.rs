//! Analyst panel nodes of the research graph

use serde_json::json;
use std::sync::Arc;

use super::config::ResearchContext;
use super::prompts::{requests, ResearchPrompts};
use super::state::{Perspectives, ResearchGraphState, ResearchGraphUpdate};
use crate::envelope::{record_error, record_recovery};
use crate::error::ResearchError;
use crate::llm::invoke_structured;
use crate::state::Message;
use crate::workflow::NodeOutput;

pub const CREATE_ANALYSTS: &str = "create_analysts";
pub const HUMAN_FEEDBACK: &str = "human_feedback";

/// Generate (or regenerate, on feedback) the analyst panel.
///
/// A success following a failed attempt also records a `regenerate_analysts`
/// recovery.
pub async fn create_analysts(
    ctx: Arc<ResearchContext>,
    state: ResearchGraphState,
) -> NodeOutput<ResearchGraphUpdate> {
    let feedback = state.human_analyst_feedback.as_deref().unwrap_or_default();
    let messages = [
        Message::system(ResearchPrompts::analysts(&state.topic, feedback, state.max_analysts)),
        Message::user(requests::GENERATE_ANALYSTS),
    ];

    let perspectives: Perspectives =
        match invoke_structured(ctx.llm.as_ref(), &messages, ctx.llm_config()).await {
            Ok(perspectives) => perspectives,
            Err(e) => {
                let err = ResearchError::from(e);
                return NodeOutput::failed(record_error(&state, &err, CREATE_ANALYSTS));
            }
        };

    let mut analysts = perspectives.analysts;
    if analysts.len() > state.max_analysts {
        tracing::debug!(
            generated = analysts.len(),
            max_analysts = state.max_analysts,
            "trimming analyst panel"
        );
        analysts.truncate(state.max_analysts);
    }
    tracing::info!(topic = %state.topic, analysts = analysts.len(), "analyst panel ready");

    let retried = state
        .errors
        .error
        .as_ref()
        .is_some_and(|e| e.node == CREATE_ANALYSTS);
    let mut update = ResearchGraphUpdate::analysts(analysts.clone());
    if retried {
        let details = json!({ "analysts": analysts.len() });
        update = update.with_errors(record_recovery(&state, "regenerate_analysts", true, Some(details)));
    }
    NodeOutput::update(update)
}

/// Suspend point for human review of the panel; changes nothing.
pub async fn human_feedback(_state: ResearchGraphState) -> NodeOutput<ResearchGraphUpdate> {
    NodeOutput::update(ResearchGraphUpdate::default())
}
