//! Conversation persistence contract.
//!
//! The orchestration core never writes history itself. A chat front end
//! appends each turn to a [`ConversationStore`] and hands the most recent
//! window to the coordinator as a [`ConversationContext`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use crate::error::Result;
use crate::message::{ConversationContext, Message, SessionId};

/// An external store of role-tagged messages keyed by session.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    fn name(&self) -> &str;

    /// Append a message to the end of a session.
    async fn append(&self, session: &SessionId, message: Message) -> Result<()>;

    /// The most recent `limit` messages of a session, oldest first.
    async fn recent(&self, session: &SessionId, limit: usize) -> Result<Vec<Message>>;

    /// Drop every message of a session.
    async fn clear(&self, session: &SessionId) -> Result<()>;

    /// The recent window as a context ready for the coordinator.
    async fn context(&self, session: &SessionId, window: usize) -> Result<ConversationContext> {
        let messages = self.recent(session, window).await?;
        Ok(ConversationContext::window(messages, window))
    }
}

/// Ephemeral store for the interactive CLI and tests.
#[derive(Default)]
pub struct InMemoryConversationStore {
    sessions: Arc<RwLock<HashMap<SessionId, Vec<Message>>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    fn name(&self) -> &str { "in_memory" }

    async fn append(&self, session: &SessionId, message: Message) -> Result<()> {
        self.sessions
            .write()
            .await
            .entry(session.clone())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn recent(&self, session: &SessionId, limit: usize) -> Result<Vec<Message>> {
        let sessions = self.sessions.read().await;
        let Some(messages) = sessions.get(session) else {
            return Ok(Vec::new());
        };
        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }

    async fn clear(&self, session: &SessionId) -> Result<()> {
        self.sessions.write().await.remove(session);
        Ok(())
    }
}
