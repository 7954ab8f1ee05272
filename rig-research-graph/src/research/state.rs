//! Research workflow state definitions
//!
//! Two graphs share these types:
//! - the outer research graph over [`ResearchGraphState`]
//! - the interview sub-graph over [`InterviewState`], one instance per analyst
//!
//! Every field is a channel; update structs only expose the merge policy the
//! channel declares (see `pregel::channel`).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::envelope::{ErrorDelta, ErrorFields, ErrorState};
use crate::llm::StructuredOutput;
use crate::pregel::channel::{Append, ChannelSpec, Overwrite};
use crate::pregel::state::WorkflowState;
use crate::pregel::vertex::StateUpdate;
use crate::state::Message;

/// Default number of expert answers per interview
pub const DEFAULT_MAX_NUM_TURNS: usize = 2;

/// An analyst persona that conducts one interview
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analyst {
    pub name: String,
    pub role: String,
    pub affiliation: String,
    /// Focus, concerns and motives of the analyst
    pub description: String,
}

impl Analyst {
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        affiliation: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            affiliation: affiliation.into(),
            description: description.into(),
        }
    }

    /// System-prompt fragment describing the analyst
    pub fn persona(&self) -> String {
        format!(
            "Name: {}\nRole: {}\nAffiliation: {}\nDescription: {}\n",
            self.name, self.role, self.affiliation, self.description
        )
    }
}

/// The analyst panel produced for one topic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perspectives {
    pub analysts: Vec<Analyst>,
}

impl StructuredOutput for Perspectives {
    const NAME: &'static str = "Perspectives";

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "analysts": {
                    "type": "array",
                    "description": "Comprehensive list of analysts with their roles and affiliations.",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string", "description": "Name of the analyst." },
                            "role": { "type": "string", "description": "Role of the analyst in the context of the topic." },
                            "affiliation": { "type": "string", "description": "Primary affiliation of the analyst." },
                            "description": { "type": "string", "description": "Description of the analyst focus, concerns, and motives." }
                        },
                        "required": ["name", "role", "affiliation", "description"]
                    }
                }
            },
            "required": ["analysts"]
        })
    }
}

/// Retrieval query derived from the conversation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub search_query: String,
}

impl StructuredOutput for SearchQuery {
    const NAME: &'static str = "SearchQuery";

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "search_query": { "type": "string", "description": "Search query for retrieval." }
            },
            "required": ["search_query"]
        })
    }
}

// =============================================================================
// Interview sub-graph
// =============================================================================

/// State of a single analyst interview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewState {
    pub analyst: Analyst,
    pub messages: Vec<Message>,
    /// One entry per retrieval call, in call order
    pub context: Vec<String>,
    pub max_num_turns: usize,
    /// Flattened transcript, set by `save_interview`
    pub interview: Option<String>,
    pub sections: Vec<String>,
    #[serde(flatten)]
    pub errors: ErrorFields,
}

impl Default for InterviewState {
    fn default() -> Self {
        Self {
            analyst: Analyst::default(),
            messages: Vec::new(),
            context: Vec::new(),
            max_num_turns: DEFAULT_MAX_NUM_TURNS,
            interview: None,
            sections: Vec::new(),
            errors: ErrorFields::default(),
        }
    }
}

impl InterviewState {
    pub fn new(analyst: Analyst, messages: Vec<Message>) -> Self {
        Self {
            analyst,
            messages,
            ..Default::default()
        }
    }

    pub fn with_max_num_turns(mut self, turns: usize) -> Self {
        self.max_num_turns = turns;
        self
    }
}

/// Partial update of an [`InterviewState`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterviewUpdate {
    pub messages: Append<Message>,
    pub context: Append<String>,
    pub interview: Overwrite<String>,
    pub sections: Append<String>,
    pub errors: ErrorDelta,
}

impl InterviewUpdate {
    pub fn message(message: Message) -> Self {
        Self {
            messages: Append::one(message),
            ..Default::default()
        }
    }

    pub fn context(entry: impl Into<String>) -> Self {
        Self {
            context: Append::one(entry.into()),
            ..Default::default()
        }
    }

    pub fn interview(transcript: impl Into<String>) -> Self {
        Self {
            interview: Overwrite::new(transcript.into()),
            ..Default::default()
        }
    }

    pub fn section(section: impl Into<String>) -> Self {
        Self {
            sections: Append::one(section.into()),
            ..Default::default()
        }
    }
}

impl From<ErrorDelta> for InterviewUpdate {
    fn from(errors: ErrorDelta) -> Self {
        Self {
            errors,
            ..Default::default()
        }
    }
}

impl StateUpdate for InterviewUpdate {
    fn empty() -> Self {
        Self::default()
    }

    fn is_empty(&self) -> bool {
        self.messages.is_empty()
            && self.context.is_empty()
            && !self.interview.is_set()
            && self.sections.is_empty()
            && self.errors.is_empty()
    }

    fn merge(&mut self, later: Self) {
        self.messages.merge(later.messages);
        self.context.merge(later.context);
        self.interview.merge(later.interview);
        self.sections.merge(later.sections);
        self.errors.merge(later.errors);
    }
}

impl WorkflowState for InterviewState {
    type Update = InterviewUpdate;

    fn apply_update(&self, update: Self::Update) -> Self {
        let mut next = self.clone();
        update.messages.apply_to(&mut next.messages);
        update.context.apply_to(&mut next.context);
        update.interview.apply_some(&mut next.interview);
        update.sections.apply_to(&mut next.sections);
        update.errors.apply(&mut next.errors);
        next
    }

    fn channels() -> &'static [ChannelSpec] {
        const CHANNELS: &[ChannelSpec] = &[
            ChannelSpec::overwrite("analyst"),
            ChannelSpec::append("messages"),
            ChannelSpec::append("context"),
            ChannelSpec::overwrite("max_num_turns"),
            ChannelSpec::overwrite("interview"),
            ChannelSpec::append("sections"),
            ChannelSpec::error_log("error_history"),
        ];
        CHANNELS
    }
}

impl ErrorState for InterviewState {
    fn errors(&self) -> &ErrorFields {
        &self.errors
    }

    fn state_keys(&self) -> Vec<String> {
        channel_names::<Self>()
    }
}

// =============================================================================
// Outer research graph
// =============================================================================

/// State of the outer research graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchGraphState {
    pub topic: String,
    pub max_analysts: usize,
    /// `None` or `"good"` (any case) approves the analyst panel
    pub human_analyst_feedback: Option<String>,
    pub analysts: Vec<Analyst>,
    /// One section per interview, in branch-spawn order
    pub sections: Vec<String>,
    pub introduction: Option<String>,
    pub content: Option<String>,
    pub conclusion: Option<String>,
    pub final_report: Option<String>,
    #[serde(flatten)]
    pub errors: ErrorFields,
}

impl ResearchGraphState {
    pub fn new(topic: impl Into<String>, max_analysts: usize) -> Self {
        Self {
            topic: topic.into(),
            max_analysts,
            ..Default::default()
        }
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.human_analyst_feedback = Some(feedback.into());
        self
    }
}

/// Partial update of a [`ResearchGraphState`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResearchGraphUpdate {
    pub human_analyst_feedback: Overwrite<Option<String>>,
    pub analysts: Overwrite<Vec<Analyst>>,
    pub sections: Append<String>,
    pub introduction: Overwrite<String>,
    pub content: Overwrite<String>,
    pub conclusion: Overwrite<String>,
    pub final_report: Overwrite<String>,
    pub errors: ErrorDelta,
}

impl ResearchGraphUpdate {
    /// Feedback injected on resume; `None` approves the panel
    pub fn feedback(feedback: Option<String>) -> Self {
        Self {
            human_analyst_feedback: Overwrite::new(feedback),
            ..Default::default()
        }
    }

    pub fn analysts(analysts: Vec<Analyst>) -> Self {
        Self {
            analysts: Overwrite::new(analysts),
            ..Default::default()
        }
    }

    pub fn sections(sections: Vec<String>) -> Self {
        Self {
            sections: Append::new(sections),
            ..Default::default()
        }
    }

    pub fn introduction(text: impl Into<String>) -> Self {
        Self {
            introduction: Overwrite::new(text.into()),
            ..Default::default()
        }
    }

    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Overwrite::new(text.into()),
            ..Default::default()
        }
    }

    pub fn conclusion(text: impl Into<String>) -> Self {
        Self {
            conclusion: Overwrite::new(text.into()),
            ..Default::default()
        }
    }

    pub fn final_report(text: impl Into<String>) -> Self {
        Self {
            final_report: Overwrite::new(text.into()),
            ..Default::default()
        }
    }

    /// Attach error envelope changes to this update
    pub fn with_errors(mut self, errors: ErrorDelta) -> Self {
        self.errors.merge(errors);
        self
    }
}

impl From<ErrorDelta> for ResearchGraphUpdate {
    fn from(errors: ErrorDelta) -> Self {
        Self {
            errors,
            ..Default::default()
        }
    }
}

impl StateUpdate for ResearchGraphUpdate {
    fn empty() -> Self {
        Self::default()
    }

    fn is_empty(&self) -> bool {
        !self.human_analyst_feedback.is_set()
            && !self.analysts.is_set()
            && self.sections.is_empty()
            && !self.introduction.is_set()
            && !self.content.is_set()
            && !self.conclusion.is_set()
            && !self.final_report.is_set()
            && self.errors.is_empty()
    }

    fn merge(&mut self, later: Self) {
        self.human_analyst_feedback.merge(later.human_analyst_feedback);
        self.analysts.merge(later.analysts);
        self.sections.merge(later.sections);
        self.introduction.merge(later.introduction);
        self.content.merge(later.content);
        self.conclusion.merge(later.conclusion);
        self.final_report.merge(later.final_report);
        self.errors.merge(later.errors);
    }
}

impl WorkflowState for ResearchGraphState {
    type Update = ResearchGraphUpdate;

    fn apply_update(&self, update: Self::Update) -> Self {
        let mut next = self.clone();
        update
            .human_analyst_feedback
            .apply_to(&mut next.human_analyst_feedback);
        update.analysts.apply_to(&mut next.analysts);
        update.sections.apply_to(&mut next.sections);
        update.introduction.apply_some(&mut next.introduction);
        update.content.apply_some(&mut next.content);
        update.conclusion.apply_some(&mut next.conclusion);
        update.final_report.apply_some(&mut next.final_report);
        update.errors.apply(&mut next.errors);
        next
    }

    fn channels() -> &'static [ChannelSpec] {
        const CHANNELS: &[ChannelSpec] = &[
            ChannelSpec::overwrite("topic"),
            ChannelSpec::overwrite("max_analysts"),
            ChannelSpec::overwrite("human_analyst_feedback"),
            ChannelSpec::overwrite("analysts"),
            ChannelSpec::append("sections"),
            ChannelSpec::overwrite("introduction"),
            ChannelSpec::overwrite("content"),
            ChannelSpec::overwrite("conclusion"),
            ChannelSpec::overwrite("final_report"),
            ChannelSpec::error_log("error_history"),
        ];
        CHANNELS
    }
}

impl ErrorState for ResearchGraphState {
    fn errors(&self) -> &ErrorFields {
        &self.errors
    }

    fn state_keys(&self) -> Vec<String> {
        channel_names::<Self>()
    }
}

/// Channel names plus the envelope's fields
fn channel_names<S: WorkflowState>() -> Vec<String> {
    let mut keys: Vec<String> = S::channels()
        .iter()
        .filter(|c| c.name != "error_history")
        .map(|c| c.name.to_string())
        .collect();
    keys.extend(ErrorFields::default().state_keys());
    keys
}
