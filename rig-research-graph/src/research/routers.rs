//! Routing decisions for both graphs
//!
//! Routers are pure functions of the merged state. They name the next
//! node(s) or, for the interview fan-out, return one spawn per analyst.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::analysts::CREATE_ANALYSTS;
use super::interview::{ASK_QUESTION, SAVE_INTERVIEW};
use super::prompts::{requests, INTERVIEW_CLOSING};
use super::state::{Analyst, InterviewState, ResearchGraphState};
use crate::pregel::edge::{Route, Spawn};
use crate::state::{Message, Role};

/// Fan-out target running one interview per analyst
pub const CONDUCT_INTERVIEW: &str = "conduct_interview";

/// Feedback value (any case) that approves the analyst panel
pub const APPROVED_FEEDBACK: &str = "good";

/// Continue the interview or wrap it up.
///
/// Saves once the expert answered `max_num_turns` times, or when the
/// analyst's last question closed the interview.
pub fn route_messages(state: &InterviewState, expert_name: &str) -> Route {
    let messages = &state.messages;

    let responses = messages
        .iter()
        .filter(|m| m.is_from(Role::Assistant, expert_name))
        .count();
    if responses >= state.max_num_turns {
        return Route::to(SAVE_INTERVIEW);
    }

    let closed = messages.len() >= 2
        && messages[messages.len() - 2]
            .content
            .contains(INTERVIEW_CLOSING);
    if closed {
        Route::to(SAVE_INTERVIEW)
    } else {
        Route::to(ASK_QUESTION)
    }
}

/// Payload of one interview branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewSeed {
    pub analyst: Analyst,
    pub messages: Vec<Message>,
}

impl InterviewSeed {
    pub fn new(analyst: Analyst, topic: &str) -> Self {
        Self {
            analyst,
            messages: vec![Message::user(requests::interview_opening(topic))],
        }
    }

    pub fn to_payload(&self) -> Value {
        serde_json::json!({
            "analyst": self.analyst,
            "messages": self.messages,
        })
    }
}

/// True when the panel was approved (no feedback, or "good")
pub fn is_approved(feedback: Option<&str>) -> bool {
    feedback.map_or(true, |f| f.to_lowercase() == APPROVED_FEEDBACK)
}

/// Regenerate the panel on feedback, otherwise start one interview per analyst.
pub fn initiate_all_interviews(state: &ResearchGraphState) -> Route {
    if !is_approved(state.human_analyst_feedback.as_deref()) {
        return Route::to(CREATE_ANALYSTS);
    }

    if state.analysts.is_empty() {
        tracing::warn!(topic = %state.topic, "no analysts to interview");
    }

    Route::Spawn(
        state
            .analysts
            .iter()
            .map(|analyst| {
                let seed = InterviewSeed::new(analyst.clone(), &state.topic);
                Spawn::new(CONDUCT_INTERVIEW, seed.to_payload())
            })
            .collect(),
    )
}
