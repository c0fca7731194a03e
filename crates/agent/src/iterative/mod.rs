//! Iterative reasoning loop: a bounded THOUGHT → ACTION → OBSERVATION cycle.
//!
//! Each pass sends the running conversation to the model and parses the
//! reply. A final answer ends the run. An action is executed through the
//! tool registry and its observation fed back. Anything else earns a
//! nudge and costs one pass. When the budget runs out the loop makes one
//! forced "answer now" request and takes whatever comes back.
//!
//! The loop never makes more than `max_iterations + 1` model calls, and a
//! tool failure is only ever an observation.

pub mod parser;

use agromesh_core::event::{DomainEvent, EventBus};
use agromesh_core::message::{ConversationContext, Message};
use agromesh_core::provider::ModelClient;
use agromesh_core::tool::{ToolInput, ToolRegistry};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use crate::stream_event::CompletionInfo;

pub use parser::{parse_response, ParsedResponse};

const CONTINUE_AFTER_OBSERVATION: &str = "Continue with your next step.";
const CONTINUE_AFTER_ERROR: &str = "Try a different approach.";
const CONTINUE_AFTER_THOUGHT: &str =
    "Continue with your next step or provide FINAL_ANSWER if ready.";
const REFORMAT_REQUEST: &str = "Your last reply did not follow the required format. \
Reply with THOUGHT followed by either ACTION and ACTION_INPUT, or FINAL_ANSWER. \
The JSON object format is also accepted.";
const FORCE_FINAL_ANSWER: &str = "Based on all the information gathered in the previous steps, \
please provide a FINAL_ANSWER to the user's question.";
const EXHAUSTED_APOLOGY: &str =
    "I apologize, but I couldn't complete the task within the allowed iterations.";

/// One pass of the loop. Final steps keep their answer in `observation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationStep {
    pub step_number: usize,
    pub thought: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_input: Option<ToolInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    pub is_final: bool,
}

impl IterationStep {
    fn new(step_number: usize, thought: impl Into<String>) -> Self {
        Self {
            step_number,
            thought: thought.into(),
            action: None,
            action_input: None,
            observation: None,
            is_final: false,
        }
    }

    fn finished(step_number: usize, thought: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            observation: Some(answer.into()),
            is_final: true,
            ..Self::new(step_number, thought)
        }
    }

    /// One-line rendering used when reasoning is streamed.
    pub fn describe(&self) -> String {
        let mut out = format!("Step {}", self.step_number);
        if !self.thought.is_empty() {
            out.push_str(&format!(" | THOUGHT: {}", self.thought));
        }
        if let Some(action) = &self.action {
            let input = self.action_input.as_ref().map(ToolInput::summary).unwrap_or_default();
            out.push_str(&format!(" | ACTION: {action}({input})"));
        }
        if !self.is_final {
            if let Some(observation) = &self.observation {
                out.push_str(&format!(" | OBSERVATION: {observation}"));
            }
        }
        out.push('\n');
        out
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The model gave a final answer within budget.
    Final,
    /// Budget spent; the answer came from the forced final request.
    Exhausted,
    /// A model call failed mid-run.
    Failed,
}

/// Result of one loop run.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// User-facing text. Never empty.
    pub answer: String,
    /// The ordered audit trail.
    pub steps: Vec<IterationStep>,
    pub model_calls: usize,
    pub tool_calls: usize,
    pub termination: Termination,
    pub error: Option<String>,
}

impl LoopOutcome {
    pub fn max_iterations_reached(&self) -> bool {
        self.termination == Termination::Exhausted
    }

    pub fn success(&self) -> bool {
        self.termination != Termination::Failed && self.error.is_none()
    }

    pub fn completion_info(&self) -> CompletionInfo {
        CompletionInfo {
            iterations: self.steps.len(),
            max_iterations_reached: self.max_iterations_reached(),
            success: self.success(),
            error: self.error.clone(),
            tool_calls: self.tool_calls,
        }
    }
}

struct Observation {
    text: String,
    success: bool,
    executed: bool,
}

/// The bounded reasoning loop.
pub struct IterativeLoop {
    model: ModelClient,
    tools: Arc<ToolRegistry>,
    max_iterations: usize,
    history_window: usize,
    event_bus: Option<Arc<EventBus>>,
}

impl IterativeLoop {
    pub fn new(model: ModelClient, tools: Arc<ToolRegistry>) -> Self {
        Self {
            model,
            tools,
            max_iterations: 5,
            history_window: 5,
            event_bus: None,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Run the loop for `query`. Model failures become text, never errors.
    pub async fn run(&self, query: &str, context: &ConversationContext) -> LoopOutcome {
        let mut messages = vec![Message::system(self.system_prompt())];
        messages.extend(context.truncated(self.history_window).messages().iter().cloned());
        messages.push(Message::user(query));

        let mut steps: Vec<IterationStep> = Vec::new();
        let mut model_calls = 0;
        let mut tool_calls = 0;

        for iteration in 1..=self.max_iterations {
            debug!(iteration, max = self.max_iterations, "Starting iteration");
            model_calls += 1;

            let reply = match self.model.invoke(messages.clone()).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(iteration, error = %e, "Model call failed, ending run");
                    let step = IterationStep::finished(
                        iteration,
                        format!("Model call failed: {e}"),
                        String::new(),
                    );
                    self.record(&step);
                    steps.push(step);
                    return LoopOutcome {
                        answer: format!(
                            "I apologize, but I encountered an error while working on your request: {e}"
                        ),
                        steps,
                        model_calls,
                        tool_calls,
                        termination: Termination::Failed,
                        error: Some(e.to_string()),
                    };
                }
            };

            let parsed = match parse_response(&reply) {
                ParsedResponse::Final { thought, answer } if thought.is_empty() && answer.is_empty() => {
                    ParsedResponse::Unstructured { text: reply.trim().to_string() }
                }
                parsed => parsed,
            };

            let (step, feedback) = match parsed {
                ParsedResponse::Final { thought, answer } => {
                    let answer = if answer.is_empty() { thought.clone() } else { answer };
                    let step = IterationStep::finished(iteration, thought, answer.clone());
                    self.record(&step);
                    steps.push(step);
                    info!(iterations = iteration, tool_calls, "Final answer reached");
                    return LoopOutcome {
                        answer: non_empty(answer, &reply),
                        steps,
                        model_calls,
                        tool_calls,
                        termination: Termination::Final,
                        error: None,
                    };
                }
                ParsedResponse::Action { thought, action, input } => {
                    let mut step = IterationStep::new(iteration, thought);
                    step.action = Some(action.clone());
                    let observation = match input {
                        Ok(input) => {
                            step.action_input = Some(input.clone());
                            self.execute(&action, input).await
                        }
                        Err(message) => {
                            warn!(iteration, action = %action, "Unreadable ACTION_INPUT");
                            Observation {
                                text: message,
                                success: false,
                                executed: false,
                            }
                        }
                    };
                    if observation.executed {
                        tool_calls += 1;
                    }
                    let next = if observation.success {
                        CONTINUE_AFTER_OBSERVATION
                    } else {
                        CONTINUE_AFTER_ERROR
                    };
                    let feedback = format!("OBSERVATION: {}\n\n{next}", observation.text);
                    step.observation = Some(observation.text);
                    (step, feedback)
                }
                ParsedResponse::Thought { thought } => {
                    (IterationStep::new(iteration, thought), CONTINUE_AFTER_THOUGHT.to_string())
                }
                ParsedResponse::Unstructured { text } => {
                    debug!(iteration, "Reply had no recognizable format");
                    (IterationStep::new(iteration, text), REFORMAT_REQUEST.to_string())
                }
            };

            self.record(&step);
            steps.push(step);
            messages.push(Message::assistant(reply));
            messages.push(Message::user(feedback));
        }

        warn!(max = self.max_iterations, "Reached maximum iterations without a final answer");
        messages.push(Message::user(FORCE_FINAL_ANSWER));
        model_calls += 1;

        // The forced request is a terminal transition, not another pass.
        let (answer, error) = match self.model.invoke(messages).await {
            Ok(reply) => {
                let answer = match parse_response(&reply) {
                    ParsedResponse::Final { answer, thought } if answer.is_empty() => thought,
                    ParsedResponse::Final { answer, .. } => answer,
                    _ => reply.trim().to_string(),
                };
                (non_empty(answer, EXHAUSTED_APOLOGY), None)
            }
            Err(e) => {
                warn!(error = %e, "Forced final answer request failed");
                (EXHAUSTED_APOLOGY.to_string(), Some(e.to_string()))
            }
        };

        LoopOutcome {
            answer,
            steps,
            model_calls,
            tool_calls,
            termination: Termination::Exhausted,
            error,
        }
    }

    async fn execute(&self, action: &str, input: ToolInput) -> Observation {
        let tool = match self.tools.get(action) {
            Ok(tool) => tool,
            Err(_) => {
                warn!(tool = %action, "Model asked for an unknown tool");
                return Observation {
                    text: format!(
                        "Error: Unknown tool '{action}'. Available tools: {:?}",
                        self.tools.names()
                    ),
                    success: false,
                    executed: false,
                };
            }
        };

        debug!(tool = %action, input = %input.summary(), "Executing tool");
        let start = std::time::Instant::now();
        let result = tool.invoke(input).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let (text, success) = match result {
            Ok(r) => (r.output, r.success),
            Err(e) => (format!("Error executing {action}: {e}"), false),
        };
        info!(tool = %action, success, duration_ms, "Tool executed");

        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::ToolExecuted {
                tool_name: action.to_string(),
                success,
                duration_ms,
                timestamp: Utc::now(),
            });
        }
        Observation {
            text,
            success,
            executed: true,
        }
    }

    fn record(&self, step: &IterationStep) {
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::IterationCompleted {
                step_number: step.step_number,
                action: step.action.clone(),
                is_final: step.is_final,
                timestamp: Utc::now(),
            });
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            r#"You are an agent that solves problems step by step using tools.

Work in iterations:
1. THOUGHT: decide what to do next
2. ACTION: pick one tool, if you need one
3. OBSERVATION: you will receive the tool result
Repeat until you can answer, then give a FINAL_ANSWER.

Available tools:
{catalog}

Rules:
- You have at most {max} iterations.
- Every iteration must move closer to the answer. Do not call tools you do not need.
- Once you have enough information, give the FINAL_ANSWER.

Reply format for a step:
THOUGHT: your reasoning
ACTION: tool_name
ACTION_INPUT: {{"parameter": "value"}}

Reply format when you are done:
THOUGHT: your final reasoning
FINAL_ANSWER: your complete answer to the user

You may instead reply with one JSON object:
{{"kind": "action", "thought": "...", "action": "tool_name", "action_input": {{"parameter": "value"}}}}
{{"kind": "final", "thought": "...", "answer": "..."}}

Example:
THOUGHT: I need the weather for the user's farm first.
ACTION: get_weather
ACTION_INPUT: {{"location": "Nashik"}}"#,
            catalog = self.tools.catalog(),
            max = self.max_iterations,
        )
    }
}

fn non_empty(answer: String, fallback: &str) -> String {
    if answer.trim().is_empty() {
        fallback.trim().to_string()
    } else {
        answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use agromesh_core::error::ProviderError;

    fn looped(provider: Arc<ScriptedProvider>, max: usize) -> IterativeLoop {
        IterativeLoop::new(model(provider), Arc::new(agromesh_tools::default_registry()))
            .with_max_iterations(max)
    }

    #[tokio::test]
    async fn final_answer_on_first_pass() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            "THOUGHT: Easy.\nFINAL_ANSWER: Mulch keeps moisture in.",
        ]));
        let outcome = looped(provider.clone(), 5).run("Why mulch?", &ConversationContext::empty()).await;

        assert_eq!(outcome.answer, "Mulch keeps moisture in.");
        assert_eq!(outcome.termination, Termination::Final);
        assert_eq!(outcome.steps.len(), 1);
        assert!(outcome.steps[0].is_final);
        assert_eq!(outcome.model_calls, 1);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn action_observation_then_final() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            "THOUGHT: Compute it.\nACTION: calculate\nACTION_INPUT: {\"expression\": \"(10 * 5) + 2\"}",
            "FINAL_ANSWER: The result is 52.",
        ]));
        let outcome = looped(provider.clone(), 5).run("What is 10*5+2?", &ConversationContext::empty()).await;

        assert_eq!(outcome.answer, "The result is 52.");
        assert_eq!(outcome.tool_calls, 1);
        let step = &outcome.steps[0];
        assert_eq!(step.action.as_deref(), Some("calculate"));
        assert!(step.observation.as_deref().unwrap().contains("\"result\":52"));

        let requests = provider.requests();
        let feedback = &requests[1].last().unwrap().content;
        assert!(feedback.starts_with("OBSERVATION: "));
        assert!(feedback.ends_with(CONTINUE_AFTER_OBSERVATION));
    }

    #[tokio::test]
    async fn unknown_tool_becomes_an_observation() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            "ACTION: soil_auger\nACTION_INPUT: {\"depth\": 10}",
            "FINAL_ANSWER: I could not measure the soil.",
        ]));
        let outcome = looped(provider, 5).run("Check my soil", &ConversationContext::empty()).await;

        let observation = outcome.steps[0].observation.clone().unwrap();
        assert!(observation.starts_with("Error: Unknown tool 'soil_auger'. Available tools: ["));
        assert!(observation.contains("\"calculate\""));
        assert_eq!(outcome.tool_calls, 0);
        assert_eq!(outcome.termination, Termination::Final);
    }

    #[tokio::test]
    async fn tool_error_does_not_abort() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            "ACTION: get_weather\nACTION_INPUT: 42",
            "ACTION: calculate\nACTION_INPUT: {\"expression\": 10 *}",
            "FINAL_ANSWER: Done anyway.",
        ]));
        let outcome = looped(provider.clone(), 5).run("q", &ConversationContext::empty()).await;

        assert_eq!(outcome.answer, "Done anyway.");
        let first = outcome.steps[0].observation.clone().unwrap();
        assert!(first.starts_with("Error executing get_weather: "));
        let second = outcome.steps[1].observation.clone().unwrap();
        assert!(second.starts_with("Invalid JSON format in ACTION_INPUT"));
        assert!(outcome.steps[1].action_input.is_none());
        assert_eq!(outcome.tool_calls, 1);

        let requests = provider.requests();
        let feedback = &requests[1].last().unwrap().content;
        assert!(feedback.ends_with(CONTINUE_AFTER_ERROR));
    }

    #[tokio::test]
    async fn unstructured_reply_requests_reformat() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            "Sure, let me look into that.",
            "THOUGHT: Thinking about crops.",
            "FINAL_ANSWER: Rotate legumes.",
        ]));
        let outcome = looped(provider.clone(), 5).run("q", &ConversationContext::empty()).await;

        assert_eq!(outcome.steps.len(), 3);
        let requests = provider.requests();
        assert_eq!(requests[1].last().unwrap().content, REFORMAT_REQUEST);
        assert_eq!(requests[2].last().unwrap().content, CONTINUE_AFTER_THOUGHT);
    }

    #[tokio::test]
    async fn exhaustion_forces_one_final_call() {
        let provider = Arc::new(ScriptedProvider::repeating("THOUGHT: still thinking"));
        let outcome = looped(provider.clone(), 3).run("q", &ConversationContext::empty()).await;

        assert_eq!(provider.call_count(), 4);
        assert_eq!(outcome.model_calls, 4);
        assert!(outcome.max_iterations_reached());
        assert_eq!(outcome.answer, "THOUGHT: still thinking");
        assert_eq!(outcome.steps.len(), 3);
        assert_eq!(outcome.steps.last().unwrap().step_number, 3);
        assert!(outcome.steps.iter().all(|s| !s.is_final));
        assert_eq!(
            provider.requests()[3].last().unwrap().content,
            FORCE_FINAL_ANSWER
        );

        let info = outcome.completion_info();
        assert_eq!(info.iterations, 3);
        assert!(info.max_iterations_reached);
        assert!(info.success);
    }

    #[tokio::test]
    async fn exhaustion_prefers_parsed_final_answer() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            "THOUGHT: a",
            "THOUGHT: b",
            "THOUGHT: summing up\nFINAL_ANSWER: Plant after the first rain.",
        ]));
        // Budget of 2: the third reply answers the forced request.
        let outcome = looped(provider, 2).run("q", &ConversationContext::empty()).await;
        assert_eq!(outcome.answer, "Plant after the first rain.");
        assert_eq!(outcome.termination, Termination::Exhausted);
    }

    #[tokio::test]
    async fn empty_final_answer_requests_reformat() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            "THOUGHT:\nFINAL_ANSWER:",
            "FINAL_ANSWER: Sow in June.",
        ]));
        let outcome = looped(provider.clone(), 5).run("q", &ConversationContext::empty()).await;

        assert_eq!(outcome.answer, "Sow in June.");
        assert_eq!(outcome.steps.len(), 2);
        assert!(!outcome.steps[0].is_final);
        let requests = provider.requests();
        assert_eq!(requests[1].last().unwrap().content, REFORMAT_REQUEST);
    }

    #[tokio::test]
    async fn empty_forced_answer_uses_apology() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            "THOUGHT: hmm",
            "THOUGHT:\nFINAL_ANSWER:",
        ]));
        let outcome = looped(provider, 1).run("q", &ConversationContext::empty()).await;
        assert_eq!(outcome.answer, EXHAUSTED_APOLOGY);
        assert_eq!(outcome.completion_info().iterations, 1);
    }

    #[tokio::test]
    async fn model_failure_ends_with_error_text() {
        let provider = Arc::new(ScriptedProvider::with_results(vec![
            Ok("ACTION: get_location".into()),
            Err(ProviderError::Network("connection reset".into())),
        ]));
        let outcome = looped(provider.clone(), 5).run("q", &ConversationContext::empty()).await;

        assert_eq!(outcome.termination, Termination::Failed);
        assert!(outcome.answer.contains("connection reset"));
        assert_eq!(provider.call_count(), 2);
        let info = outcome.completion_info();
        assert!(!info.success);
        assert!(info.error.is_some());
    }

    #[tokio::test]
    async fn forced_call_failure_still_answers() {
        let provider = Arc::new(ScriptedProvider::with_results(vec![
            Ok("THOUGHT: hmm".into()),
            Err(ProviderError::Timeout("slow".into())),
        ]));
        let outcome = looped(provider, 1).run("q", &ConversationContext::empty()).await;
        assert_eq!(outcome.answer, EXHAUSTED_APOLOGY);
        assert!(outcome.max_iterations_reached());
        assert!(!outcome.success());
    }

    #[tokio::test]
    async fn publishes_iteration_and_tool_events() {
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let provider = Arc::new(ScriptedProvider::new(vec![
            "ACTION: get_location",
            "FINAL_ANSWER: You are in Baroda.",
        ]));
        looped(provider, 5)
            .with_event_bus(bus.clone())
            .run("Where am I?", &ConversationContext::empty())
            .await;

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event.as_ref() {
                DomainEvent::ToolExecuted { tool_name, success, .. } => {
                    assert_eq!(tool_name, "get_location");
                    assert!(*success);
                    "tool"
                }
                DomainEvent::IterationCompleted { is_final, .. } => {
                    if *is_final { "final" } else { "step" }
                }
                _ => "other",
            });
        }
        assert_eq!(kinds, vec!["tool", "step", "final"]);
    }

    #[tokio::test]
    async fn system_prompt_lists_tools_and_budget() {
        let provider = Arc::new(ScriptedProvider::new(vec!["FINAL_ANSWER: ok"]));
        looped(provider.clone(), 7).run("q", &ConversationContext::empty()).await;
        let requests = provider.requests();
        let system = &requests[0][0].content;
        assert!(system.contains("- get_weather: "));
        assert!(system.contains("at most 7 iterations"));
    }

    #[test]
    fn describe_renders_action_steps() {
        let mut step = IterationStep::new(2, "need weather");
        step.action = Some("get_weather".into());
        step.action_input = Some(ToolInput::from("Pune"));
        step.observation = Some("sunny".into());
        assert_eq!(
            step.describe(),
            "Step 2 | THOUGHT: need weather | ACTION: get_weather(Pune) | OBSERVATION: sunny\n"
        );
    }
}
