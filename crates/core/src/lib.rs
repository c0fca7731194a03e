//! # AgroMesh Core
//!
//! Domain types, traits, and error definitions for the AgroMesh agent
//! orchestration core. Nothing in here talks to the network: model
//! backends, tools and stores are traits implemented by other crates.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the orchestration core is defined as a trait here.
//! Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;
pub mod history;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{ConversationContext, Message, Role, SessionId};
pub use provider::{ModelClient, Provider, ProviderRequest, ProviderResponse, Usage};
pub use tool::{CallingConvention, Tool, ToolDescriptor, ToolInput, ToolRegistry, ToolResult};
pub use history::{ConversationStore, InMemoryConversationStore};
pub use event::{DomainEvent, EventBus};
