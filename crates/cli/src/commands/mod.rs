//! Command handlers and the wiring they share.

pub mod ask;
pub mod chat;
pub mod config_cmd;
pub mod route;
pub mod tools;

use std::path::Path;
use std::sync::Arc;

use agromesh_agent::{Coordinator, ResponseChunk};
use agromesh_config::AppConfig;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

/// Load configuration from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(config)
}

/// Build the coordinator, refusing to start without a model API key.
pub fn build_coordinator(config: &AppConfig) -> Result<Coordinator, Box<dyn std::error::Error>> {
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    AGROMESH_API_KEY = 'sk-...'   (recommended)");
        eprintln!("    LLM_API_KEY      = 'sk-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let models = agromesh_providers::build_from_config(config);
    let tools = Arc::new(agromesh_tools::default_registry());
    let coordinator = Coordinator::from_config(config, models, tools)
        .map_err(|e| format!("Failed to set up responders: {e}"))?;
    Ok(coordinator)
}

/// Write a chunk stream to `out` as it arrives. Reasoning goes to stderr.
///
/// Returns the reconstructed answer.
pub async fn print_stream<W: std::io::Write>(
    rx: mpsc::Receiver<ResponseChunk>,
    out: &mut W,
) -> std::io::Result<String> {
    let mut stream = ReceiverStream::new(rx);
    let mut answer = String::new();

    while let Some(chunk) = stream.next().await {
        match chunk {
            ResponseChunk::Text { content } => {
                out.write_all(content.as_bytes())?;
                out.flush()?;
                answer.push_str(&content);
            }
            ResponseChunk::Reasoning { content } => eprint!("  · {content}"),
            ResponseChunk::Done { info } => {
                if let Some(info) = info {
                    tracing::debug!(
                        iterations = info.iterations,
                        tool_calls = info.tool_calls,
                        success = info.success,
                        "Stream complete"
                    );
                }
                break;
            }
        }
    }
    writeln!(out)?;
    Ok(answer)
}
