mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "akira", version, about = "Akira, a chat companion with per-user memory")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the WhatsApp webhook server
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Chat with Akira in the terminal
    Chat {
        /// Sender identifier to chat as
        #[arg(long)]
        user: Option<String>,
    },
    /// Show the stored memory and recent turns of a user
    Inspect {
        /// Sender identifier (e.g. whatsapp:+34600000000)
        user: String,
    },
    /// Export all user states as JSON to stdout
    Export,
    /// Import user states from an export file
    Import {
        file: PathBuf,
        /// Replace users that already exist
        #[arg(long)]
        overwrite: bool,
    },
    /// Delete one user's state, or everyone's
    Reset {
        user: Option<String>,
    },
    /// Check storage, completion and OCR configuration
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = akira::config::AkiraConfig::load()?;

    // Log to stderr so `export` output on stdout stays clean.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            akira::server::serve_http(config).await?;
        }
        Command::Chat { user } => cli::chat::chat(&config, user.as_deref()).await?,
        Command::Inspect { user } => cli::inspect::inspect(&config, &user)?,
        Command::Export => cli::export::export(&config)?,
        Command::Import { file, overwrite } => cli::import::import(&config, &file, overwrite)?,
        Command::Reset { user } => cli::reset::reset(&config, user.as_deref())?,
        Command::Doctor => cli::doctor::doctor(&config)?,
    }

    Ok(())
}
