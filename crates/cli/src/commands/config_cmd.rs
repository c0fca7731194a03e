//! `agromesh config` — show the effective or default configuration.

use std::path::Path;

use agromesh_config::AppConfig;

use super::load_config;

pub async fn run(config_path: Option<&Path>, default: bool) -> Result<(), Box<dyn std::error::Error>> {
    if default {
        print!("{}", AppConfig::default_toml());
        return Ok(());
    }

    let config = load_config(config_path)?;
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));

    println!("# {}", path.display());
    if !config.has_api_key() {
        println!("# ⚠️  No API key set (set AGROMESH_API_KEY or LLM_API_KEY)");
    }
    println!("{}", toml::to_string_pretty(&redacted(&config))?);
    Ok(())
}

/// A copy of `config` safe to print.
fn redacted(config: &AppConfig) -> AppConfig {
    let mask = |key: &Option<String>| key.as_ref().map(|_| "***".to_string());
    let mut shown = config.clone();
    shown.api_key = mask(&config.api_key);
    shown.router.api_key = mask(&config.router.api_key);
    shown
}
