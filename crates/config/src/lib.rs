//! Configuration loading, validation, and management for AgroMesh.
//!
//! Loads configuration from `~/.agromesh/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.agromesh/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the main reasoning model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Main reasoning model
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature for responders and the iterative loop
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per main-model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Small classification model used by the router
    #[serde(default)]
    pub router: RouterModelConfig,

    /// Coordinator and loop settings
    #[serde(default)]
    pub orchestration: OrchestrationConfig,

    /// Per-responder switches, keyed by responder name
    #[serde(default)]
    pub responders: BTreeMap<String, ResponderToggle>,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("router", &self.router)
            .field("orchestration", &self.orchestration)
            .field("responders", &self.responders)
            .finish()
    }
}

impl std::fmt::Debug for RouterModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterModelConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// The router's classification model. Unset fields fall back to the main
/// model's endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct RouterModelConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default = "default_router_temperature")]
    pub temperature: f32,

    #[serde(default = "default_router_max_tokens")]
    pub max_tokens: u32,
}

fn default_router_temperature() -> f32 {
    0.0
}
fn default_router_max_tokens() -> u32 {
    200
}

impl Default for RouterModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: None,
            model: None,
            temperature: default_router_temperature(),
            max_tokens: default_router_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Iteration budget of the reasoning loop (one extra forced call follows)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Prior turns passed to responders
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Pause between streamed chunks, 0 disables pacing
    #[serde(default = "default_stream_delay_ms")]
    pub stream_delay_ms: u64,

    #[serde(default = "default_true")]
    pub parallel_enabled: bool,

    #[serde(default = "default_max_parallel_agents")]
    pub max_parallel_agents: usize,

    /// Stream the loop's intermediate thoughts and observations
    #[serde(default)]
    pub expose_reasoning: bool,

    /// Responder used when nothing else matches
    #[serde(default = "default_catch_all")]
    pub catch_all: String,
}

fn default_max_iterations() -> usize {
    5
}
fn default_history_window() -> usize {
    5
}
fn default_stream_delay_ms() -> u64 {
    30
}
fn default_max_parallel_agents() -> usize {
    3
}
fn default_catch_all() -> String {
    "general".into()
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            history_window: default_history_window(),
            stream_delay_ms: default_stream_delay_ms(),
            parallel_enabled: true,
            max_parallel_agents: default_max_parallel_agents(),
            expose_reasoning: false,
            catch_all: default_catch_all(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponderToggle {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ResponderToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.agromesh/config.toml).
    ///
    /// Environment variables override the file:
    /// - `AGROMESH_API_KEY` (highest priority), then `LLM_API_KEY`
    /// - `LLM_BASE_URL`, `LLM_MODEL`
    /// - `SMALL_LLM_API_KEY`, `SMALL_LLM_BASE_URL`, `SMALL_LLM_MODEL`
    /// - `AGROMESH_MAX_ITERATIONS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply environment overrides and validate.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("AGROMESH_API_KEY").or_else(|| lookup("LLM_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup("LLM_BASE_URL") {
            self.api_url = url;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.model = model;
        }
        if let Some(key) = lookup("SMALL_LLM_API_KEY") {
            self.router.api_key = Some(key);
        }
        if let Some(url) = lookup("SMALL_LLM_BASE_URL") {
            self.router.api_url = Some(url);
        }
        if let Some(model) = lookup("SMALL_LLM_MODEL") {
            self.router.model = Some(model);
        }
        if let Some(raw) = lookup("AGROMESH_MAX_ITERATIONS") {
            self.orchestration.max_iterations = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "AGROMESH_MAX_ITERATIONS must be a positive integer, got '{raw}'"
                ))
            })?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".agromesh")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.router.temperature) {
            return Err(ConfigError::ValidationError(
                "router.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.orchestration.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "orchestration.max_iterations must be at least 1".into(),
            ));
        }
        if self.orchestration.max_parallel_agents == 0 {
            return Err(ConfigError::ValidationError(
                "orchestration.max_parallel_agents must be at least 1".into(),
            ));
        }
        if !self.responder_enabled(&self.orchestration.catch_all) {
            return Err(ConfigError::ValidationError(format!(
                "catch-all responder '{}' must stay enabled",
                self.orchestration.catch_all
            )));
        }
        Ok(())
    }

    /// Whether a responder is switched on. Responders not listed are on.
    pub fn responder_enabled(&self, name: &str) -> bool {
        self.responders.get(name).is_none_or(|t| t.enabled)
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Effective router endpoint: `(api_key, api_url, model)`.
    pub fn router_endpoint(&self) -> (Option<&str>, &str, &str) {
        (
            self.router.api_key.as_deref().or(self.api_key.as_deref()),
            self.router.api_url.as_deref().unwrap_or(&self.api_url),
            self.router.model.as_deref().unwrap_or(&self.model),
        )
    }

    /// Generate a default config TOML string (for `config --default`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            router: RouterModelConfig::default(),
            orchestration: OrchestrationConfig::default(),
            responders: BTreeMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
