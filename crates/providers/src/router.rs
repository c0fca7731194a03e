//! Model wiring: builds the two model clients the orchestration core uses.
//!
//! The router gets a small, deterministic classification model; responders
//! and the iterative loop share the main reasoning model. Both may point at
//! the same endpoint.

use std::sync::Arc;
use agromesh_core::provider::{ModelClient, Provider};
use crate::openai_compat::OpenAiCompatProvider;

/// The router's model and the main reasoning model.
#[derive(Debug, Clone)]
pub struct ModelPair {
    pub router: ModelClient,
    pub main: ModelClient,
}

/// Build both model clients from configuration.
pub fn build_from_config(config: &agromesh_config::AppConfig) -> ModelPair {
    let main_provider: Arc<dyn Provider> = Arc::new(OpenAiCompatProvider::new(
        provider_name(&config.api_url),
        &config.api_url,
        config.api_key.clone().unwrap_or_default(),
    ));

    let (router_key, router_url, router_model) = config.router_endpoint();
    let router_provider: Arc<dyn Provider> =
        if router_url == config.api_url && router_key == config.api_key.as_deref() {
            main_provider.clone()
        } else {
            Arc::new(OpenAiCompatProvider::new(
                provider_name(router_url),
                router_url,
                router_key.unwrap_or_default(),
            ))
        };

    ModelPair {
        router: ModelClient::new(router_provider, router_model)
            .with_temperature(config.router.temperature)
            .with_max_tokens(config.router.max_tokens),
        main: ModelClient::new(main_provider, &config.model)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens),
    }
}

/// Name a provider after its well-known base URL.
fn provider_name(base_url: &str) -> &'static str {
    if base_url.contains("openrouter.ai") {
        "openrouter"
    } else if base_url.contains("api.openai.com") {
        "openai"
    } else if base_url.contains(":11434") {
        "ollama"
    } else if base_url.contains("api.groq.com") {
        "groq"
    } else if base_url.contains("api.together.xyz") {
        "together"
    } else if base_url.contains("api.deepseek.com") {
        "deepseek"
    } else {
        "custom"
    }
}
