//! Message and conversation-context value objects.
//!
//! A user turn flows through the system as a query string plus a
//! [`ConversationContext`]: the recent window of prior turns owned by the
//! surrounding chat session. The orchestration core reads the context but
//! never mutates or persists it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a chat session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions
    System,
}

/// A single role-tagged message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }
}

/// Recent prior turns, oldest first, truncated to a fixed window.
///
/// This is the only state that crosses turn boundaries. System messages
/// are never carried: each responder supplies its own instructions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationContext {
    messages: Vec<Message>,
}

impl ConversationContext {
    /// An empty context (first turn of a session).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Keep the newest `window` user/assistant messages, preserving order.
    pub fn window(messages: impl IntoIterator<Item = Message>, window: usize) -> Self {
        let mut messages: Vec<Message> = messages
            .into_iter()
            .filter(|m| m.role != Role::System)
            .collect();
        if messages.len() > window {
            messages.drain(..messages.len() - window);
        }
        Self { messages }
    }

    /// Re-window an existing context to at most `window` messages.
    pub fn truncated(&self, window: usize) -> Self {
        Self::window(self.messages.iter().cloned(), window)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
