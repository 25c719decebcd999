//! Pili CLI — the main entry point.
//!
//! Commands:
//! - `serve`   — Start the HTTP chat server
//! - `doctor`  — Diagnose connectivity to the tool server and LLM backend
//! - `memory`  — Inspect or clear stored conversations

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "pili",
    about = "Pili — multi-agent conversational fitness assistant",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP chat server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Diagnose connectivity to the tool server and LLM backend
    Doctor,

    /// Inspect or clear stored conversations
    Memory {
        #[command(subcommand)]
        command: commands::memory::MemoryCommand,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Memory { command } => commands::memory::run(command).await?,
    }

    Ok(())
}
