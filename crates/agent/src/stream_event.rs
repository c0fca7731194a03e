//! Streaming output types.
//!
//! A streamed answer is an ordered sequence of [`ResponseChunk`]s ending in
//! exactly one [`ResponseChunk::Done`]. Concatenating the `Text` chunks in
//! order reproduces the answer byte-for-byte. `Reasoning` chunks are side
//! channel content and never part of the answer.

use serde::{Deserialize, Serialize};

/// One element of a streamed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseChunk {
    /// A piece of the answer text.
    Text { content: String },

    /// Intermediate loop reasoning, only sent when exposure is enabled.
    Reasoning { content: String },

    /// The completion marker. Always last, always exactly once.
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        info: Option<CompletionInfo>,
    },
}

impl ResponseChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text { content: content.into() }
    }

    /// The `(chunk, is_complete)` view of this element.
    ///
    /// `Reasoning` chunks have no answer view and return `None`.
    pub fn as_pair(&self) -> Option<(&str, bool)> {
        match self {
            Self::Text { content } => Some((content.as_str(), false)),
            Self::Reasoning { .. } => None,
            Self::Done { .. } => Some(("", true)),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

/// Summary attached to the completion marker of an iterative run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionInfo {
    /// Loop passes made. The forced final request after exhaustion is not a pass.
    pub iterations: usize,
    pub max_iterations_reached: bool,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tool_calls: usize,
}
