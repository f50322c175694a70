//! Prompt message types.
//!
//! Provider-agnostic; [`super::provider`] translates them into each backend's
//! wire format.

use serde::{Deserialize, Serialize};

/// The role of a participant in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Persona and mode instructions.
    System,
    /// Input from the Telegram user.
    User,
    /// A previous bot reply.
    Assistant,
}

impl Role {
    /// Label used when a prompt is flattened into plain text.
    pub fn label(&self) -> &'static str {
        match self {
            Self::System => "System",
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// One role-tagged unit of conversational context. Built per request, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Content of the last user message, the one a reply must not echo.
pub fn last_user_text(messages: &[PromptMessage]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
}
