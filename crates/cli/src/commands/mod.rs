pub mod chat;
pub mod config_cmd;
pub mod doctor;
pub mod tools;

use std::sync::Arc;
use std::time::Duration;
use toolchat_agent::Agent;
use toolchat_config::AppConfig;
use toolchat_core::tool::CapabilityRegistry;
use tracing::debug;

/// Load the config, failing with a readable message.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Build the capability registry described by `[tools]`.
pub fn build_registry(config: &AppConfig) -> Result<CapabilityRegistry, Box<dyn std::error::Error>> {
    let timeout = Duration::from_secs(config.agent.tool_timeout_secs);
    Ok(toolchat_tools::default_registry(&config.tools, timeout)
        .map_err(|e| format!("Failed to set up tools: {e}"))?)
}

/// Wire provider, tools, and settings into an agent.
pub fn build_agent(config: &AppConfig) -> Result<Agent, Box<dyn std::error::Error>> {
    let router = toolchat_providers::router::build_from_config(config);
    let provider = router.default().ok_or("No default provider configured")?;
    let registry = Arc::new(build_registry(config)?);
    debug!(
        provider = %provider.name(),
        model = %config.effective_model(),
        tools = ?registry.identifiers(),
        "Agent wired"
    );
    Ok(Agent::new(provider, registry, config.to_agent_settings()))
}
