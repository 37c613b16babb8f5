//! `toolchat doctor` — Diagnose system health.

use toolchat_config::AppConfig;
use toolchat_core::provider::Provider;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 toolchat Doctor — System Diagnostics");
    println!("========================================\n");

    let mut issues = 0;

    println!("  ✅ Rust binary running");

    // Config file is optional; defaults apply without one
    let config_path = AppConfig::config_path();
    if config_path.exists() {
        println!("  ✅ Config file found at {}", config_path.display());
    } else {
        println!("  ℹ️  No config file, using defaults (`toolchat config init` to create one)");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. See above for details.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  ✅ Model API key configured");
    } else {
        println!("  ⚠️  No model API key — set GROQ_API_KEY or add api_key to config.toml");
        issues += 1;
    }

    match super::build_registry(&config) {
        Ok(registry) => println!("  ✅ Tools ready: {}", registry.identifiers().join(", ")),
        Err(e) => {
            println!("  ❌ Tool setup failed: {e}");
            issues += 1;
        }
    }

    if config
        .tools
        .enabled
        .iter()
        .any(|t| t == toolchat_tools::web_search::IDENTIFIER)
        && config.tools.tavily_api_key.is_none()
    {
        println!("  ⚠️  Web search enabled without TAVILY_API_KEY");
        issues += 1;
    }

    // Provider reachability
    if config.has_api_key() {
        let router = toolchat_providers::router::build_from_config(&config);
        match router.default() {
            Some(provider) => match provider.health_check().await {
                Ok(true) => println!("  ✅ Provider '{}' reachable", provider.name()),
                Ok(false) => {
                    println!("  ❌ Provider '{}' rejected the request (check the key)", provider.name());
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Provider '{}' unreachable: {e}", provider.name());
                    issues += 1;
                }
            },
            None => {
                println!("  ❌ No default provider configured");
                issues += 1;
            }
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
