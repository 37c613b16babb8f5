//! `toolchat config` — Configuration management commands.

use std::path::Path;
use toolchat_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let warnings = warnings(&config);
            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            let agent = &config.agent;
            println!();
            println!("   Provider:     {}", config.default_provider);
            println!("   Model:        {}", config.effective_model());
            println!("   Tools:        {}", config.tools.enabled.join(", "));
            println!("   Loop policy:  {:?}", agent.loop_policy);
            println!("   On failure:   {:?}", agent.invocation_failure_policy);
            println!("   Max lookups:  {}", agent.max_tool_invocations);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

/// Problems that don't stop the config from loading.
fn warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();

    if !config.has_api_key() {
        warnings.push("No API key set (set GROQ_API_KEY or TOOLCHAT_API_KEY env var)");
    }

    if config
        .tools
        .enabled
        .iter()
        .any(|t| t == toolchat_tools::web_search::IDENTIFIER)
        && config.tools.tavily_api_key.is_none()
    {
        warnings.push("Web search is enabled but TAVILY_API_KEY is not set");
    }

    if config.tools.enabled.is_empty() {
        warnings.push("No tools enabled; the agent can only answer from the model");
    }

    warnings
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let toml_str = toml::to_string_pretty(&config.redacted())?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}

pub async fn init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = AppConfig::config_path();
    write_default(&path, force)?;
    println!("✅ Wrote default config to {}", path.display());
    Ok(())
}

fn write_default(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !force {
        return Err(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )
        .into());
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(())
}
