//! Domain events for decoupled observation of the orchestration core.
//!
//! The router, coordinator and iterative loop publish events as they work.
//! Front ends and tests can subscribe; nobody has to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The router produced a decision for a query
    QueryRouted {
        mode: String,
        agents: Vec<String>,
        parallel: bool,
        fallback: bool,
        timestamp: DateTime<Utc>,
    },

    /// A responder failed and its contribution was dropped
    ResponderFailed {
        responder: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// One pass of the iterative loop finished
    IterationCompleted {
        step_number: usize,
        action: Option<String>,
        is_final: bool,
        timestamp: DateTime<Utc>,
    },

    /// A complete answer was produced for a query
    AnswerCompleted {
        mode: String,
        answer_chars: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::QueryRouted {
            mode: "simple".into(),
            agents: vec!["weather".into()],
            parallel: false,
            fallback: true,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::QueryRouted { agents, fallback, .. } => {
                assert_eq!(agents, &vec!["weather".to_string()]);
                assert!(fallback);
            }
            _ => panic!("Expected QueryRouted event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::ResponderFailed {
            responder: "weather".into(),
            error_message: "no subscribers".into(),
            timestamp: Utc::now(),
        });
    }
}
