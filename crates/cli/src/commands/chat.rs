//! `agromesh chat` — interactive session with remembered history.

use std::io::Write;
use std::path::Path;

use agromesh_core::history::{ConversationStore, InMemoryConversationStore};
use agromesh_core::message::{Message, SessionId};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{build_coordinator, load_config, print_stream};

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let coordinator = build_coordinator(&config)?;
    let window = config.orchestration.history_window;

    let store = InMemoryConversationStore::new();
    let session = SessionId::new();

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        AgroMesh — Interactive Session        ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Model:      {}", config.model);
    println!("  Router:     {}", config.router_endpoint().2);
    println!("  Agents:     {}", coordinator.responders().names().join(", "));
    println!("  History:    last {window} messages");
    println!();
    println!("  Type your question and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    loop {
        print!("  You > ");
        stdout.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query, "exit" | "quit") {
            break;
        }

        let context = store.context(&session, window).await?;
        print!("  Assistant > ");
        stdout.flush()?;
        let answer = print_stream(coordinator.stream_process(query, context), &mut stdout).await?;
        println!();

        store.append(&session, Message::user(query)).await?;
        store.append(&session, Message::assistant(&answer)).await?;
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}
