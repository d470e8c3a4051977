//! Example: console chat with a configurable memory strategy
//!
//! Reads `.env`, loads `convmem.toml` (or the path in `CONVMEM_CONFIG`) plus
//! `CONVMEM__*` overrides, and chats over stdin against the configured
//! OpenAI-compatible endpoint. The memory snapshot is printed after every
//! turn. `/reset` clears the session, `/key <sequence>` flags a message,
//! `/metrics` dumps Prometheus metrics and `/quit` exits.

use conversation_memory::{logging, metrics, prelude::*};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let path = std::env::var("CONVMEM_CONFIG").unwrap_or_else(|_| "convmem.toml".to_string());
    let config = if std::path::Path::new(&path).exists() {
        Config::load(Some(path.as_str()))?
    } else {
        Config::load(None)?
    };
    logging::init(&config.logging)?;

    let registry = SessionRegistry::new(SessionSettings::from_config(&config)?);
    let session_id = new_session_id();
    let strategy = config.memory.strategy;
    let session = registry.get_or_create(&session_id, &strategy)?;

    println!("Session {} using {}", session_id, strategy.label());
    println!("Commands: /reset, /key <sequence>, /metrics, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.split_once(' ').unwrap_or((input, "")) {
            ("/quit", _) => break,
            ("/reset", _) => {
                registry.clear(&session_id, &strategy).await;
                println!("Memory cleared.");
                continue;
            }
            ("/metrics", _) => {
                println!("{}", metrics::encode_text());
                continue;
            }
            ("/key", arg) => {
                match arg.trim().parse::<u64>() {
                    Ok(sequence) => match session.mark_key(sequence, true).await {
                        Ok(()) => println!("Message {} flagged as key.", sequence),
                        Err(e) => println!("{}", e),
                    },
                    Err(_) => println!("Usage: /key <sequence>"),
                }
                continue;
            }
            _ => {}
        }

        match session.run_turn(input).await {
            Ok(outcome) => {
                println!("{}", outcome.reply);
                if let TurnUpdate::SummarizationDeferred { reason } = &outcome.update {
                    println!("(summary not updated: {})", reason);
                }
            }
            Err(e) if e.is_recoverable() => println!("Error: {}. Try again.", e),
            Err(e) => println!("Error: {}", e),
        }

        let snapshot = session.snapshot().await;
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }

    Ok(())
}
