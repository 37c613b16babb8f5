//! Configuration loading, validation, and management for toolchat.
//!
//! Loads configuration from `~/.toolchat/config.toml` with environment
//! variable overrides. Validates all settings at startup and converts them
//! into the [`AgentSettings`] record the agent is constructed with.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use toolchat_core::agent::{
    AgentSettings, InvocationFailurePolicy, LoopPolicy, DEFAULT_SYSTEM_INSTRUCTION,
};

/// The root configuration structure.
///
/// Maps directly to `~/.toolchat/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model provider API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Control loop behavior
    #[serde(default)]
    pub agent: AgentConfig,

    /// Built-in capability settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "groq".into()
}
fn default_model() -> String {
    "llama-3.1-8b-instant".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_true() -> bool {
    true
}

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
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("agent", &self.agent)
            .field("tools", &self.tools)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl std::fmt::Debug for ToolsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolsConfig")
            .field("enabled", &self.enabled)
            .field("tavily_api_key", &redact(&self.tavily_api_key))
            .field("wikipedia", &self.wikipedia)
            .field("arxiv", &self.arxiv)
            .field("web_search", &self.web_search)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Override the built-in system instruction. An empty string disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Maximum capability invocations per user turn
    #[serde(default = "default_max_tool_invocations")]
    pub max_tool_invocations: u32,

    #[serde(default)]
    pub loop_policy: LoopPolicy,

    #[serde(default)]
    pub invocation_failure_policy: InvocationFailurePolicy,

    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,

    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

fn default_max_tool_invocations() -> u32 {
    3
}
fn default_model_timeout_secs() -> u64 {
    60
}
fn default_tool_timeout_secs() -> u64 {
    30
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_tool_invocations: default_max_tool_invocations(),
            loop_policy: LoopPolicy::default(),
            invocation_failure_policy: InvocationFailurePolicy::default(),
            model_timeout_secs: default_model_timeout_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Capability identifiers to register, in menu order
    #[serde(default = "default_enabled_tools")]
    pub enabled: Vec<String>,

    /// Tavily search API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tavily_api_key: Option<String>,

    #[serde(default)]
    pub wikipedia: WikipediaConfig,

    #[serde(default)]
    pub arxiv: ArxivConfig,

    #[serde(default)]
    pub web_search: WebSearchConfig,
}

fn default_enabled_tools() -> Vec<String> {
    vec![
        "arxiv".into(),
        "wikipedia".into(),
        "tavily_search_results_json".into(),
    ]
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_tools(),
            tavily_api_key: None,
            wikipedia: WikipediaConfig::default(),
            arxiv: ArxivConfig::default(),
            web_search: WebSearchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikipediaConfig {
    #[serde(default = "default_wikipedia_lang")]
    pub language: String,

    #[serde(default = "default_top_k")]
    pub top_k_results: usize,

    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

fn default_wikipedia_lang() -> String {
    "en".into()
}
fn default_top_k() -> usize {
    3
}
fn default_max_chars() -> usize {
    4000
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            language: default_wikipedia_lang(),
            top_k_results: default_top_k(),
            max_chars: default_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArxivConfig {
    #[serde(default = "default_top_k")]
    pub top_k_results: usize,

    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            top_k_results: default_top_k(),
            max_chars: default_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default = "default_web_results")]
    pub max_results: usize,

    #[serde(default = "default_true")]
    pub include_answer: bool,
}

fn default_web_results() -> usize {
    5
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_web_results(),
            include_answer: true,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.toolchat/config.toml).
    ///
    /// Then applies environment overrides, see [`AppConfig::apply_env`].
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
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

    /// Apply environment overrides through `lookup`.
    ///
    /// Keys, highest priority first:
    /// - `TOOLCHAT_API_KEY`, `GROQ_API_KEY`, `GROK_API_KEY` (only when no key is configured)
    /// - `TAVILY_API_KEY` (only when no key is configured)
    /// - `TOOLCHAT_PROVIDER`, `TOOLCHAT_MODEL` (always win)
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = ["TOOLCHAT_API_KEY", "GROQ_API_KEY", "GROK_API_KEY"]
                .iter()
                .find_map(|key| lookup(key).filter(|v| !v.is_empty()));
        }

        if self.tools.tavily_api_key.is_none() {
            self.tools.tavily_api_key = lookup("TAVILY_API_KEY").filter(|v| !v.is_empty());
        }

        if let Some(provider) = lookup("TOOLCHAT_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("TOOLCHAT_MODEL") {
            self.default_model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".toolchat")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_tool_invocations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tool_invocations must be at least 1".into(),
            ));
        }

        if self.agent.model_timeout_secs == 0 || self.agent.tool_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "agent timeouts must be greater than 0".into(),
            ));
        }

        if let Some(dup) = first_duplicate(&self.tools.enabled) {
            return Err(ConfigError::ValidationError(format!(
                "tool '{dup}' is enabled more than once"
            )));
        }

        Ok(())
    }

    /// Check if a model API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Model to use, honoring a per-provider override.
    pub fn effective_model(&self) -> String {
        self.providers
            .get(&self.default_provider)
            .and_then(|p| p.default_model.clone())
            .unwrap_or_else(|| self.default_model.clone())
    }

    /// Build the settings record the agent is constructed with.
    pub fn to_agent_settings(&self) -> AgentSettings {
        let system_instruction = match &self.agent.system_prompt {
            Some(prompt) if prompt.trim().is_empty() => None,
            Some(prompt) => Some(prompt.clone()),
            None => Some(DEFAULT_SYSTEM_INSTRUCTION.to_string()),
        };

        AgentSettings {
            model: self.effective_model(),
            temperature: self.default_temperature,
            max_tokens: Some(self.default_max_tokens),
            system_instruction,
            max_invocations: self.agent.max_tool_invocations,
            loop_policy: self.agent.loop_policy,
            failure_policy: self.agent.invocation_failure_policy,
            model_timeout: Duration::from_secs(self.agent.model_timeout_secs),
            tool_timeout: Duration::from_secs(self.agent.tool_timeout_secs),
        }
    }

    /// A copy with every secret masked, safe to print.
    pub fn redacted(&self) -> Self {
        fn mask(key: &Option<String>) -> Option<String> {
            key.as_ref().map(|_| "***".to_string())
        }

        let mut copy = self.clone();
        copy.api_key = mask(&self.api_key);
        copy.tools.tavily_api_key = mask(&self.tools.tavily_api_key);
        for provider in copy.providers.values_mut() {
            provider.api_key = mask(&provider.api_key);
        }
        copy
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
            providers: HashMap::new(),
        }
    }
}

fn first_duplicate(items: &[String]) -> Option<&str> {
    items
        .iter()
        .enumerate()
        .find(|&(i, item)| items[..i].contains(item))
        .map(|(_, item)| item.as_str())
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
