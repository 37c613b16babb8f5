//! `toolchat tools` — List the capabilities offered to the model.

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let registry = super::build_registry(&config)?;

    if registry.is_empty() {
        println!("No tools enabled. Add names to `tools.enabled` in the config file.");
        return Ok(());
    }

    println!("Available tools ({}):", registry.len());
    println!();
    for descriptor in registry.describe_all() {
        println!("  {}", descriptor.identifier);
        println!("      {}", descriptor.description);
    }

    if registry.get(toolchat_tools::web_search::IDENTIFIER).is_ok()
        && config.tools.tavily_api_key.is_none()
    {
        println!();
        println!(
            "  ⚠️  {} needs TAVILY_API_KEY; calls will fail until it is set.",
            toolchat_tools::web_search::IDENTIFIER
        );
    }

    Ok(())
}
