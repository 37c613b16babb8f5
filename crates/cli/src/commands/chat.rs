//! `toolchat chat` — Interactive or single-message chat mode.

use std::io::Write;
use toolchat_config::AppConfig;
use toolchat_core::message::{Conversation, Role, Turn};
use tokio::io::{AsyncBufReadExt, BufReader};

const EVIDENCE_PREVIEW_CHARS: usize = 300;

pub async fn run(message: Option<String>, show_evidence: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    // Check for API key early — give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    export GROQ_API_KEY='gsk_...'       (recommended)");
        eprintln!("    export TOOLCHAT_API_KEY='...'       (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_path().display());
        eprintln!();
        eprintln!("  Get a Groq key at: https://console.groq.com/keys");
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let agent = super::build_agent(&config)?;

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let conversation = agent.send_message(&agent.start_session(), &msg).await;
        eprint!("\r              \r");
        print_exchange(&conversation, 0, show_evidence, false);
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        toolchat — Interactive Mode           ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", agent.provider_name());
    println!("  Model:     {}", agent.settings().model);
    println!("  Tools:     {}", agent.registry().identifiers().join(", "));
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type '/clear' to start over, 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut conversation = agent.start_session();

    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();

        match input {
            "" => {}
            "exit" | "quit" => break,
            "/clear" => {
                conversation = agent.start_session();
                println!("  (conversation cleared)");
                println!();
            }
            _ => {
                let before = conversation.len();
                eprint!("  ...");
                conversation = agent.send_message(&conversation, input).await;
                eprint!("\r     \r");
                println!();
                print_exchange(&conversation, before, show_evidence, true);
                println!();
            }
        }

        prompt()?;
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

/// Print the turns added since `from`, skipping the user's own turn.
fn print_exchange(conversation: &Conversation, from: usize, show_evidence: bool, prefixed: bool) {
    for turn in conversation.turns().iter().skip(from) {
        match turn.role {
            Role::ToolEvidence if show_evidence => {
                println!("  [evidence] {}", preview(turn));
            }
            Role::Assistant => {
                for line in turn.content.lines() {
                    if prefixed {
                        println!("  Assistant > {line}");
                    } else {
                        println!("{line}");
                    }
                }
            }
            _ => {}
        }
    }
}

fn preview(turn: &Turn) -> String {
    let flat = turn.content.replace('\n', " ");
    if flat.chars().count() > EVIDENCE_PREVIEW_CHARS {
        let cut: String = flat.chars().take(EVIDENCE_PREVIEW_CHARS).collect();
        format!("{cut}…")
    } else {
        flat
    }
}
