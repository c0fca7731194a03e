//! `agromesh ask` — answer one query and stream it to stdout.

use std::path::Path;

use agromesh_core::message::ConversationContext;

use super::{build_coordinator, load_config, print_stream};

pub async fn run(config_path: Option<&Path>, query: String) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let coordinator = build_coordinator(&config)?;

    let rx = coordinator.stream_process(query, ConversationContext::empty());
    let mut stdout = std::io::stdout();
    print_stream(rx, &mut stdout).await?;
    Ok(())
}
