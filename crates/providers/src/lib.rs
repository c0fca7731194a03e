//! LLM Provider implementations for AgroMesh.
//!
//! All providers implement the `agromesh_core::Provider` trait.
//! `build_from_config` wires the router and main model clients.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{build_from_config, ModelPair};
