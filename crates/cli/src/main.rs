//! AgroMesh CLI — the main entry point.
//!
//! Commands:
//! - `ask`     — Answer one query, streamed to stdout
//! - `chat`    — Interactive session with conversation history
//! - `route`   — Show the routing decision for a query
//! - `tools`   — List the available tools
//! - `config`  — Show the effective or default configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "agromesh",
    about = "AgroMesh — multi-agent orchestration for farming questions",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Path to a config file (default: ~/.agromesh/config.toml)
    #[arg(short, long, global = true, env = "AGROMESH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a single query
    Ask {
        /// The question to answer
        query: String,
    },

    /// Start an interactive chat session
    Chat,

    /// Print the routing decision for a query as JSON
    Route {
        /// The question to classify
        query: String,
    },

    /// List the tools available to the agents
    Tools,

    /// Show configuration
    Config {
        /// Print the default configuration instead of the effective one
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.json_logs);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Ask { query } => commands::ask::run(config_path, query).await?,
        Commands::Chat => commands::chat::run(config_path).await?,
        Commands::Route { query } => commands::route::run(config_path, &query).await?,
        Commands::Tools => commands::tools::run().await?,
        Commands::Config { default } => commands::config_cmd::run(config_path, default).await?,
    }

    Ok(())
}

/// Logs go to stderr so streamed answers on stdout stay clean.
fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ask_with_global_flags() {
        let cli = Cli::try_parse_from([
            "agromesh",
            "--verbose",
            "ask",
            "What is the weather in Mumbai?",
            "--json-logs",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert!(cli.json_logs);
        assert!(matches!(
            cli.command,
            Commands::Ask { ref query } if query == "What is the weather in Mumbai?"
        ));
    }

    #[test]
    fn parses_config_path_and_default_flag() {
        let cli = Cli::try_parse_from([
            "agromesh",
            "--config",
            "/tmp/agromesh.toml",
            "config",
            "--default",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/agromesh.toml")));
        assert!(matches!(cli.command, Commands::Config { default: true }));
    }

    #[test]
    fn route_requires_a_query() {
        assert!(Cli::try_parse_from(["agromesh", "route"]).is_err());
        assert!(matches!(
            Cli::try_parse_from(["agromesh", "tools"]).unwrap().command,
            Commands::Tools
        ));
    }
}
