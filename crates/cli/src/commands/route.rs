//! `agromesh route` — classify a query without answering it.

use std::path::Path;

use agromesh_core::message::ConversationContext;

use super::{build_coordinator, load_config};

pub async fn run(config_path: Option<&Path>, query: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let coordinator = build_coordinator(&config)?;

    let decision = coordinator.route(query, &ConversationContext::empty()).await;
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}
