//! Parsing of model replies inside the iterative loop.
//!
//! Two formats are accepted. A JSON object tagged by `kind` is tried
//! first; if the reply is not such an object the text markers
//! (`FINAL_ANSWER:`, `THOUGHT:`, `ACTION:`, `ACTION_INPUT:`) are used.
//! A final answer always wins over an action in the same reply.

use agromesh_core::tool::ToolInput;
use regex_lite::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;

static FINAL_ANSWER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)FINAL_ANSWER:\s*(.*)").expect("final answer pattern is valid")
});
static THOUGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)THOUGHT:\s*(.*)").expect("thought pattern is valid"));
static ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"ACTION:[ \t]*\**([A-Za-z_][A-Za-z0-9_]*)").expect("action pattern is valid")
});
static ACTION_INPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ACTION_INPUT:[ \t]*").expect("action input pattern is valid"));

/// What the model asked for in one reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    /// Terminal answer.
    Final { thought: String, answer: String },
    /// Run a tool. `input` is `Err` when the parameters could not be read.
    Action {
        thought: String,
        action: String,
        input: Result<ToolInput, String>,
    },
    /// Reasoning with no action and no answer.
    Thought { thought: String },
    /// Nothing recognizable; the model must be asked to reformat.
    Unstructured { text: String },
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum StructuredReply {
    #[serde(alias = "FINAL", alias = "final_answer")]
    Final {
        #[serde(default)]
        thought: String,
        answer: String,
    },
    #[serde(alias = "ACTION")]
    Action {
        #[serde(default)]
        thought: String,
        action: String,
        #[serde(default)]
        action_input: Value,
    },
    #[serde(alias = "THOUGHT")]
    Thought { thought: String },
}

impl From<StructuredReply> for ParsedResponse {
    fn from(reply: StructuredReply) -> Self {
        match reply {
            StructuredReply::Final { thought, answer } => Self::Final {
                thought: thought.trim().to_string(),
                answer: answer.trim().to_string(),
            },
            StructuredReply::Action {
                thought,
                action,
                action_input,
            } => Self::Action {
                thought: thought.trim().to_string(),
                action: action.trim().to_string(),
                input: Ok(ToolInput::from_value(action_input)),
            },
            StructuredReply::Thought { thought } => Self::Thought {
                thought: thought.trim().to_string(),
            },
        }
    }
}

/// Parse one model reply.
pub fn parse_response(text: &str) -> ParsedResponse {
    if let Some(reply) = parse_structured(text) {
        return reply.into();
    }
    parse_markers(text)
}

fn parse_structured(text: &str) -> Option<StructuredReply> {
    let body = strip_fence(text.trim());
    if !body.starts_with('{') {
        return None;
    }
    serde_json::from_str(body).ok()
}

/// Remove a surrounding ``` fence, with or without a language tag.
fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_markers(text: &str) -> ParsedResponse {
    if let Some(m) = FINAL_ANSWER.captures(text) {
        let mut region = &text[..m.get(0).map_or(0, |m| m.start())];
        if let Some(action) = ACTION.find(region) {
            region = &region[..action.start()];
        }
        return ParsedResponse::Final {
            thought: thought_in(region),
            answer: m[1].trim().to_string(),
        };
    }

    match ACTION.captures(text) {
        Some(m) => {
            let start = m.get(0).map_or(0, |m| m.start());
            let input = match ACTION_INPUT.find(text) {
                Some(marker) => parse_action_input(&text[marker.end()..]),
                None => Ok(ToolInput::Absent),
            };
            ParsedResponse::Action {
                thought: thought_in(&text[..start]),
                action: m[1].to_string(),
                input,
            }
        }
        None => {
            let thought = thought_in(text);
            if thought.is_empty() {
                ParsedResponse::Unstructured {
                    text: text.trim().to_string(),
                }
            } else {
                ParsedResponse::Thought { thought }
            }
        }
    }
}

fn thought_in(region: &str) -> String {
    THOUGHT
        .captures(region)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default()
}

/// Read tool parameters leniently.
///
/// A JSON object becomes structured input; a JSON scalar or plain text on
/// the first line becomes scalar input; a broken object is an error.
pub fn parse_action_input(raw: &str) -> Result<ToolInput, String> {
    let raw = raw.trim_start();
    if raw.starts_with('{') {
        let mut values = serde_json::Deserializer::from_str(raw).into_iter::<Value>();
        return match values.next() {
            Some(Ok(value)) => Ok(ToolInput::from_value(value)),
            Some(Err(e)) => Err(format!("Invalid JSON format in ACTION_INPUT: {e}")),
            None => Ok(ToolInput::Absent),
        };
    }

    let line = raw.lines().next().unwrap_or_default().trim();
    if line.is_empty() {
        return Ok(ToolInput::Absent);
    }
    match serde_json::from_str::<Value>(line) {
        Ok(value) => Ok(ToolInput::from_value(value)),
        Err(_) => Ok(ToolInput::Scalar(Value::String(line.to_string()))),
    }
}
