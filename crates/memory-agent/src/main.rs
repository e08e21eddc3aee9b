use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use memory_agent::{parse_line, AgentConfig, ChatSession, SessionError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Chat agent with rolling memory over an OpenAI-compatible endpoint.
///
/// Reads `author: message` lines from stdin and prints the agent's replies.
#[derive(Parser, Debug)]
#[command(name = "memory-agent", version)]
struct Cli {
    /// TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Agent name (overrides config).
    #[arg(long)]
    name: Option<String>,

    /// State file (default: bots/<name>/history.json).
    #[arg(long)]
    save_path: Option<PathBuf>,

    /// Example corpus JSON file.
    #[arg(long)]
    examples: Option<PathBuf>,

    /// Bio text (overrides saved state).
    #[arg(long)]
    bio: Option<String>,

    /// Start fresh instead of restoring saved state.
    #[arg(long)]
    no_load: bool,
}

fn build_config(cli: &Cli) -> Result<AgentConfig> {
    let mut config = match &cli.config {
        Some(path) => AgentConfig::from_toml_file(path)?,
        None => AgentConfig::from_env(),
    };
    if let Some(name) = &cli.name {
        config = config.with_name(name.clone());
    }
    if let Some(path) = &cli.save_path {
        config = config.with_save_path(path.clone());
    }
    if let Some(path) = &cli.examples {
        config = config.with_examples_path(path.clone());
    }
    if let Some(bio) = &cli.bio {
        config = config.with_bio(bio.clone());
    }
    Ok(config.with_default_save_path(Path::new(".")))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    info!(
        agent = %config.name,
        endpoint = %config.base_url,
        chat_model = %config.chat_model,
        "memory agent starting"
    );

    let mut session = ChatSession::start(&config, !cli.no_load).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let Some((author, content)) = parse_line(&line) else {
            continue;
        };
        match session.handle(&author, &content).await {
            Ok(Some(reply)) => println!("{}: {}", session.name(), reply),
            Ok(None) => {}
            Err(e @ SessionError::Save(_)) => return Err(e).context("Stopping session"),
            Err(e) => {
                if let Some(reply) = e.reply() {
                    println!("{}: {}", session.name(), reply);
                }
                warn!(error = %e, "turn failed, continuing");
            }
        }
    }

    info!(agent = %session.name(), "input closed, shutting down");
    Ok(())
}
