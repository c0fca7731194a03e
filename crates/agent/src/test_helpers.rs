//! Shared test doubles for the orchestration tests.

use agromesh_core::error::{ProviderError, ResponderError};
use agromesh_core::message::{ConversationContext, Message};
use agromesh_core::provider::{ModelClient, Provider, ProviderRequest, ProviderResponse, Usage};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use crate::responders::{Capability, Responder};

/// Wrap a test provider in a client.
pub fn model<P: Provider + 'static>(provider: Arc<P>) -> ModelClient {
    ModelClient::new(provider, "mock-model")
}

/// A provider that replays scripted replies in order.
///
/// Panics if called more times than it has replies, unless built with
/// [`ScriptedProvider::repeating`].
pub struct ScriptedProvider {
    replies: Vec<Result<String, ProviderError>>,
    repeat: bool,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<&str>) -> Self {
        Self::with_results(replies.into_iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn with_results(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies,
            repeat: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with the same text.
    pub fn repeating(reply: &str) -> Self {
        Self {
            repeat: true,
            ..Self::new(vec![reply])
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The message lists received so far, one per call.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.messages);
            requests.len() - 1
        };
        let index = if self.repeat { 0 } else { call };
        let reply = self.replies.get(index).unwrap_or_else(|| {
            panic!("ScriptedProvider: no reply for call #{call} (have {})", self.replies.len())
        });
        match reply {
            Ok(text) => Ok(ProviderResponse {
                message: Message::assistant(text),
                usage: Some(Usage::default()),
                model: "mock-model".into(),
            }),
            Err(e) => Err(e.clone()),
        }
    }
}

/// A provider whose every call fails.
pub struct FailingProvider {
    error: ProviderError,
    calls: AtomicUsize,
}

impl FailingProvider {
    pub fn new(error: ProviderError) -> Self {
        Self {
            error,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// A responder with a fixed reply, optional latency and a call counter.
pub struct StaticResponder {
    capability: Capability,
    reply: Result<String, String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl StaticResponder {
    pub fn new(capability: Capability, reply: &str) -> Self {
        Self {
            capability,
            reply: Ok(reply.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn catch_all(name: &str, reply: &str) -> Self {
        Self::new(
            Capability::new(name, "General Assistant", "Anything").as_catch_all(),
            reply,
        )
    }

    /// A responder whose model call always fails with `message`.
    pub fn failing(capability: Capability, message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            ..Self::new(capability, "")
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Responder for StaticResponder {
    fn capability(&self) -> &Capability {
        &self.capability
    }

    async fn respond(
        &self,
        _query: &str,
        _context: &ConversationContext,
    ) -> Result<String, ResponderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reply.clone().map_err(|message| ResponderError::Provider {
            responder: self.capability.name.clone(),
            source: ProviderError::Network(message),
        })
    }
}
