//! Specialized responders and the set that owns them.
//!
//! Each responder is described by a [`Capability`]: its name, label,
//! keyword predicate and priority. The router folds over registered
//! capabilities when the classifier gives no usable answer, so adding a
//! responder is a registration call rather than an edit to a routing
//! table.

pub mod profiles;
pub mod specialist;

use async_trait::async_trait;
use agromesh_core::error::ResponderError;
use agromesh_core::message::ConversationContext;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use specialist::SpecialistResponder;

/// What a responder is good at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Routing key (e.g. "weather").
    pub name: String,
    /// Human label used in merged answers (e.g. "Weather Expert").
    pub display_name: String,
    pub description: String,
    /// Lower-case phrases; any substring hit means "can handle".
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Higher goes first when several responders match.
    #[serde(default)]
    pub priority: i32,
    /// Handles anything; only chosen when nothing else matches.
    #[serde(default)]
    pub catch_all: bool,
}

impl Capability {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            description: description.into(),
            keywords: Vec::new(),
            priority: 0,
            catch_all: false,
        }
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| k.to_lowercase()).collect();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn as_catch_all(mut self) -> Self {
        self.catch_all = true;
        self
    }

    /// Keyword predicate. Pure and deterministic.
    pub fn can_handle(&self, query: &str) -> bool {
        if self.catch_all {
            return true;
        }
        let query = query.to_lowercase();
        self.keywords.iter().any(|k| query.contains(k.as_str()))
    }
}

/// Produces a domain-scoped answer for a query.
#[async_trait]
pub trait Responder: Send + Sync {
    fn capability(&self) -> &Capability;

    fn name(&self) -> &str {
        &self.capability().name
    }

    /// Answer `query`. Model failures surface as errors; the coordinator
    /// decides whether to drop or substitute this responder.
    async fn respond(
        &self,
        query: &str,
        context: &ConversationContext,
    ) -> Result<String, ResponderError>;
}

/// The registered responders, in registration order, plus the catch-all.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Clone)]
pub struct ResponderSet {
    specialists: Vec<Arc<dyn Responder>>,
    catch_all: Arc<dyn Responder>,
}

impl ResponderSet {
    /// A set whose backstop is `catch_all`.
    pub fn new(catch_all: Arc<dyn Responder>) -> Self {
        Self {
            specialists: Vec::new(),
            catch_all,
        }
    }

    /// Register a responder. Replaces any existing one with the same name.
    pub fn register(&mut self, responder: Arc<dyn Responder>) {
        if responder.name() == self.catch_all.name() {
            self.catch_all = responder;
            return;
        }
        match self.specialists.iter().position(|r| r.name() == responder.name()) {
            Some(i) => self.specialists[i] = responder,
            None => self.specialists.push(responder),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Responder>> {
        if self.catch_all.name() == name {
            return Some(&self.catch_all);
        }
        self.specialists.iter().find(|r| r.name() == name)
    }

    pub fn catch_all(&self) -> &Arc<dyn Responder> {
        &self.catch_all
    }

    pub fn specialists(&self) -> &[Arc<dyn Responder>] {
        &self.specialists
    }

    /// Specialists in registration order, then the catch-all.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Responder>> {
        self.specialists.iter().chain(std::iter::once(&self.catch_all))
    }

    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|r| r.name()).collect()
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        self.iter().map(|r| r.capability().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.specialists.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}
