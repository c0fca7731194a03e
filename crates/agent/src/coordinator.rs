//! Multi-agent coordinator. Routes a query, dispatches it, merges the
//! answers and streams the result.
//!
//! # Architecture
//!
//! ```text
//!                 Query
//!                   │
//!                   ▼
//!          ┌────────────────┐
//!          │ ComplexityRouter│  ← small model, keyword fallback
//!          └───┬────────┬───┘
//!       SIMPLE │        │ ITERATIVE
//!              ▼        ▼
//!   ┌──────────────┐  ┌───────────────┐
//!   │ Responder(s) │  │ IterativeLoop │  ← tools, bounded budget
//!   └──────┬───────┘  └───────┬───────┘
//!          └───────┬──────────┘
//!                  ▼
//!          ┌───────────────┐
//!          │ StreamEmitter │  ← word chunks + completion marker
//!          └───────────────┘
//! ```
//!
//! Multi-responder answers are merged in the order the decision names
//! them, never in completion order. A failing responder is dropped from
//! the merge; when nothing survives, the catch-all answers instead.

use agromesh_config::AppConfig;
use agromesh_core::error::ResponderError;
use agromesh_core::event::{DomainEvent, EventBus};
use agromesh_core::message::ConversationContext;
use agromesh_core::tool::ToolRegistry;
use agromesh_providers::ModelPair;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use crate::emitter::StreamEmitter;
use crate::iterative::{IterativeLoop, LoopOutcome};
use crate::responders::{profiles, Capability, Responder, ResponderSet};
use crate::router::{ComplexityRouter, RoutingDecision};
use crate::stream_event::ResponseChunk;

const PARALLEL_HEADING: &str = "Here's what I found from multiple perspectives:";
const SEQUENTIAL_HEADING: &str = "Here's a comprehensive response:";

/// A processed query with everything that led to its answer.
#[derive(Debug, Clone)]
pub struct CoordinatedAnswer {
    pub text: String,
    pub decision: RoutingDecision,
    /// Present when the iterative loop produced the answer.
    pub outcome: Option<LoopOutcome>,
}

/// The orchestration entry point. Cheap to clone; all parts are shared.
#[derive(Clone)]
pub struct Coordinator {
    router: Arc<ComplexityRouter>,
    responders: Arc<ResponderSet>,
    iterative: Arc<IterativeLoop>,
    emitter: StreamEmitter,
    event_bus: Arc<EventBus>,
    expose_reasoning: bool,
}

impl Coordinator {
    pub fn new(router: ComplexityRouter, iterative: IterativeLoop) -> Self {
        Self {
            responders: router.responders().clone(),
            router: Arc::new(router),
            iterative: Arc::new(iterative),
            emitter: StreamEmitter::default(),
            event_bus: Arc::new(EventBus::default()),
            expose_reasoning: false,
        }
    }

    /// Wire the built-in responders, router and loop from configuration.
    pub fn from_config(
        config: &AppConfig,
        models: ModelPair,
        tools: Arc<ToolRegistry>,
    ) -> Result<Self, ResponderError> {
        let orchestration = &config.orchestration;
        let event_bus = Arc::new(EventBus::default());

        let responders = Arc::new(profiles::builtin_set(
            models.main.clone(),
            tools.clone(),
            orchestration.history_window,
            |name| config.responder_enabled(name),
            &orchestration.catch_all,
        )?);
        let router = ComplexityRouter::new(models.router, responders)
            .with_max_parallel_agents(orchestration.max_parallel_agents)
            .with_parallel_enabled(orchestration.parallel_enabled);
        let iterative = IterativeLoop::new(models.main, tools)
            .with_max_iterations(orchestration.max_iterations)
            .with_history_window(orchestration.history_window)
            .with_event_bus(event_bus.clone());

        info!(
            responders = ?router.responders().names(),
            max_iterations = orchestration.max_iterations,
            "Coordinator ready"
        );

        Ok(Self::new(router, iterative)
            .with_event_bus(event_bus)
            .with_emitter(StreamEmitter::new(Duration::from_millis(orchestration.stream_delay_ms)))
            .with_expose_reasoning(orchestration.expose_reasoning))
    }

    pub fn with_emitter(mut self, emitter: StreamEmitter) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Stream each loop step as `Reasoning` chunks before the answer.
    pub fn with_expose_reasoning(mut self, expose: bool) -> Self {
        self.expose_reasoning = expose;
        self
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn responders(&self) -> &Arc<ResponderSet> {
        &self.responders
    }

    /// Registered responders, catch-all last.
    pub fn agent_info(&self) -> Vec<Capability> {
        self.responders.capabilities()
    }

    /// Route without dispatching.
    pub async fn route(&self, query: &str, context: &ConversationContext) -> RoutingDecision {
        let decision = self.router.route(query, context).await;
        self.event_bus.publish(DomainEvent::QueryRouted {
            mode: decision.mode.to_string(),
            agents: decision.agents.clone(),
            parallel: decision.parallel,
            fallback: decision.fallback,
            timestamp: Utc::now(),
        });
        decision
    }

    /// Answer a query. Always returns text.
    pub async fn process(&self, query: &str, context: &ConversationContext) -> String {
        self.process_detailed(query, context).await.text
    }

    /// Answer a query, keeping the routing decision and loop trace.
    pub async fn process_detailed(
        &self,
        query: &str,
        context: &ConversationContext,
    ) -> CoordinatedAnswer {
        let start = Instant::now();
        let decision = self.route(query, context).await;
        let (text, outcome) = self.dispatch(&decision, query, context).await;

        self.event_bus.publish(DomainEvent::AnswerCompleted {
            mode: decision.mode.to_string(),
            answer_chars: text.chars().count(),
            duration_ms: start.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });
        CoordinatedAnswer {
            text,
            decision,
            outcome,
        }
    }

    /// Carry out an existing decision.
    pub async fn dispatch(
        &self,
        decision: &RoutingDecision,
        query: &str,
        context: &ConversationContext,
    ) -> (String, Option<LoopOutcome>) {
        if decision.is_iterative() {
            let outcome = self.iterative.run(query, context).await;
            return (outcome.answer.clone(), Some(outcome));
        }

        let selected: Vec<&Arc<dyn Responder>> = decision
            .agents
            .iter()
            .filter_map(|name| {
                let responder = self.responders.get(name);
                if responder.is_none() {
                    warn!(responder = %name, "Decision names an unknown responder, skipping");
                }
                responder
            })
            .collect();

        let text = match selected.as_slice() {
            [] => self.catch_all_answer(query, context).await,
            [only] => self.single(only, query, context).await,
            many if decision.parallel => self.parallel(many, query, context).await,
            many => self.sequential(many, query, context).await,
        };
        (text, None)
    }

    async fn single(
        &self,
        responder: &Arc<dyn Responder>,
        query: &str,
        context: &ConversationContext,
    ) -> String {
        match responder.respond(query, context).await {
            Ok(answer) => answer,
            Err(e) => {
                self.responder_failed(&e);
                if responder.name() == self.responders.catch_all().name() {
                    return apology(&e);
                }
                self.catch_all_answer(query, context).await
            }
        }
    }

    async fn parallel(
        &self,
        responders: &[&Arc<dyn Responder>],
        query: &str,
        context: &ConversationContext,
    ) -> String {
        debug!(count = responders.len(), "Dispatching in parallel");
        let results = join_all(responders.iter().map(|r| r.respond(query, context))).await;

        let mut merged = format!("{PARALLEL_HEADING}\n\n");
        let mut survivors = 0;
        for (responder, result) in responders.iter().zip(results) {
            match result {
                Ok(answer) => {
                    survivors += 1;
                    merged.push_str(&format!(
                        "**{} Perspective:**\n{answer}\n\n",
                        responder.capability().display_name
                    ));
                }
                Err(e) => self.responder_failed(&e),
            }
        }

        if survivors == 0 {
            warn!("Every parallel responder failed, using the catch-all");
            return self.catch_all_answer(query, context).await;
        }
        merged.trim().to_string()
    }

    async fn sequential(
        &self,
        responders: &[&Arc<dyn Responder>],
        query: &str,
        context: &ConversationContext,
    ) -> String {
        debug!(count = responders.len(), "Dispatching sequentially");
        let mut answers: Vec<(&Capability, String)> = Vec::new();
        for responder in responders {
            match responder.respond(query, context).await {
                Ok(answer) => answers.push((responder.capability(), answer)),
                Err(e) => self.responder_failed(&e),
            }
        }

        match answers.len() {
            0 => {
                warn!("Every sequential responder failed, using the catch-all");
                self.catch_all_answer(query, context).await
            }
            1 => answers.remove(0).1,
            _ => {
                let mut merged = format!("{SEQUENTIAL_HEADING}\n\n");
                for (capability, answer) in &answers {
                    merged.push_str(&format!("**{}:**\n{answer}\n\n", capability.display_name));
                }
                merged.trim().to_string()
            }
        }
    }

    async fn catch_all_answer(&self, query: &str, context: &ConversationContext) -> String {
        let catch_all = self.responders.catch_all();
        match catch_all.respond(query, context).await {
            Ok(answer) => answer,
            Err(e) => {
                self.responder_failed(&e);
                apology(&e)
            }
        }
    }

    fn responder_failed(&self, error: &ResponderError) {
        warn!(responder = %error.responder(), error = %error, "Responder failed");
        self.event_bus.publish(DomainEvent::ResponderFailed {
            responder: error.responder().to_string(),
            error_message: error.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Answer a query as a stream of chunks ending in one completion marker.
    ///
    /// The whole answer is computed before the first text chunk is sent.
    /// Dropping the receiver abandons the work at its next await point,
    /// including any model or tool call in flight.
    pub fn stream_process(
        &self,
        query: impl Into<String>,
        context: ConversationContext,
    ) -> mpsc::Receiver<ResponseChunk> {
        let (tx, rx) = self.emitter.channel();
        let coordinator = self.clone();
        let query = query.into();

        tokio::spawn(async move {
            let answer = tokio::select! {
                answer = coordinator.process_detailed(&query, &context) => answer,
                _ = tx.closed() => {
                    debug!("Stream receiver dropped, abandoning the query");
                    return;
                }
            };
            let info = answer.outcome.as_ref().map(LoopOutcome::completion_info);

            if coordinator.expose_reasoning {
                if let Some(outcome) = &answer.outcome {
                    for step in &outcome.steps {
                        let chunk = ResponseChunk::Reasoning {
                            content: step.describe(),
                        };
                        if tx.send(chunk).await.is_err() {
                            return;
                        }
                    }
                }
            }

            if coordinator.emitter.send_text(&tx, &answer.text).await.is_err() {
                debug!("Stream receiver dropped");
                return;
            }
            let _ = StreamEmitter::finish(&tx, info).await;
        });
        rx
    }
}

fn apology(error: &ResponderError) -> String {
    format!("I apologize, but I encountered an error while processing your query: {error}")
}
