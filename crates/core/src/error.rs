//! Error types for the AgroMesh domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all AgroMesh operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Responder errors ---
    #[error("Responder error: {0}")]
    Responder(#[from] ResponderError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// A failed call to a language-model endpoint.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// A specialized responder could not produce an answer.
#[derive(Debug, Clone, Error)]
pub enum ResponderError {
    #[error("{responder} could not reach the model: {source}")]
    Provider {
        responder: String,
        #[source]
        source: ProviderError,
    },

    #[error("Unknown responder: {0}")]
    Unknown(String),
}

impl ResponderError {
    /// Name of the responder that failed.
    pub fn responder(&self) -> &str {
        match self {
            Self::Provider { responder, .. } => responder,
            Self::Unknown(name) => name,
        }
    }
}
