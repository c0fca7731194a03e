//! Model-backed responder with inline tool calls.
//!
//! The model may ask for tools by writing `TOOL_CALL: name("argument")`
//! anywhere in its reply. Every marker is executed through the registry,
//! then one follow-up call turns the results into the final answer.

use async_trait::async_trait;
use agromesh_core::error::ResponderError;
use agromesh_core::message::{ConversationContext, Message};
use agromesh_core::provider::ModelClient;
use agromesh_core::tool::{ToolInput, ToolRegistry};
use regex_lite::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};
use super::{Capability, Responder};

static TOOL_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"TOOL_CALL:\s*([A-Za-z_][A-Za-z0-9_]*)\(\s*(?:"([^"]*)"|'([^']*)'|([^)]*))\s*\)"#)
        .expect("tool call pattern is valid")
});

/// A tool request found in model text.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineToolCall {
    pub name: String,
    pub argument: String,
}

/// Extract every `TOOL_CALL: name(arg)` marker, in order of appearance.
pub fn parse_tool_calls(text: &str) -> Vec<InlineToolCall> {
    TOOL_CALL
        .captures_iter(text)
        .map(|caps| {
            let argument = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().trim().trim_matches(|c| c == '"' || c == '\''))
                .unwrap_or_default();
            InlineToolCall {
                name: caps[1].to_string(),
                argument: argument.to_string(),
            }
        })
        .collect()
}

pub struct SpecialistResponder {
    capability: Capability,
    system_prompt: String,
    model: ModelClient,
    tools: Arc<ToolRegistry>,
    history_window: usize,
}

impl SpecialistResponder {
    pub fn new(
        capability: Capability,
        system_prompt: impl Into<String>,
        model: ModelClient,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            capability,
            system_prompt: system_prompt.into(),
            model,
            tools,
            history_window: 5,
        }
    }

    /// Prior turns to include with each request.
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    fn base_messages(&self, query: &str, context: &ConversationContext) -> Vec<Message> {
        let mut messages = vec![Message::system(&self.system_prompt)];
        messages.extend(context.truncated(self.history_window).messages().iter().cloned());
        messages.push(Message::user(query));
        messages
    }

    async fn invoke(&self, messages: Vec<Message>) -> Result<String, ResponderError> {
        self.model
            .invoke(messages)
            .await
            .map_err(|source| ResponderError::Provider {
                responder: self.capability.name.clone(),
                source,
            })
    }

    /// Run each requested tool, rendering one result line per call.
    async fn run_tools(&self, calls: &[InlineToolCall]) -> Vec<String> {
        let mut lines = Vec::with_capacity(calls.len());
        for call in calls {
            let tool = match self.tools.get(&call.name) {
                Ok(tool) => tool,
                Err(_) => {
                    warn!(responder = %self.capability.name, tool = %call.name, "Unknown tool requested");
                    lines.push(format!("{}: tool not available", call.name));
                    continue;
                }
            };

            let start = std::time::Instant::now();
            let result = tool.invoke(ToolInput::from(call.argument.as_str())).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(r) => {
                    info!(responder = %self.capability.name, tool = %call.name, success = r.success, duration_ms, "Tool executed");
                    lines.push(format!("{} result: {}", call.name, r.output));
                }
                Err(e) => {
                    warn!(responder = %self.capability.name, tool = %call.name, error = %e, "Tool failed");
                    lines.push(format!("{} error: {e}", call.name));
                }
            }
        }
        lines
    }
}

#[async_trait]
impl Responder for SpecialistResponder {
    fn capability(&self) -> &Capability {
        &self.capability
    }

    async fn respond(
        &self,
        query: &str,
        context: &ConversationContext,
    ) -> Result<String, ResponderError> {
        let mut messages = self.base_messages(query, context);
        let reply = self.invoke(messages.clone()).await?;

        let calls = parse_tool_calls(&reply);
        if calls.is_empty() {
            return Ok(reply);
        }
        debug!(responder = %self.capability.name, count = calls.len(), "Reply requested tools");

        let results = self.run_tools(&calls).await;
        messages.push(Message::assistant(&reply));
        messages.push(Message::user(format!(
            "Tool results:\n{}\n\nUsing these results, give your complete answer to: {query}\nDo not write TOOL_CALL markers again.",
            results.join("\n")
        )));
        self.invoke(messages).await
    }
}
