// src/state.rs
//! Conversation messages shared by the model collaborator and the graphs

use serde::{Deserialize, Serialize};

/// Message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "human")]
    User,
    #[serde(rename = "ai")]
    Assistant,
}

impl Role {
    /// Speaker label used in flattened transcripts
    pub fn label(&self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "Human",
            Role::Assistant => "AI",
        }
    }
}

/// A single conversation turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Optional speaker tag (answers from the interviewed expert carry `"expert"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            name: None,
        }
    }

    /// Tag the message with a speaker name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Speaker shown in transcripts: the name tag, else the role label
    pub fn speaker(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.role.label())
    }

    pub fn is_from(&self, role: Role, name: &str) -> bool {
        self.role == role && self.name.as_deref() == Some(name)
    }
}

/// Flatten messages into a transcript, one `"{speaker}: {content}"` line per turn
pub fn buffer_string(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.speaker(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}
