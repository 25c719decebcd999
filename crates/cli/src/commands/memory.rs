//! The `memory` command — operate on the configured conversation store
//! directly, without going through a running server.

use clap::Subcommand;
use pili_config::AppConfig;
use pili_memory::ConversationMemory;

#[derive(Subcommand)]
pub enum MemoryCommand {
    /// Show stats for a user session, or the global aggregate
    Stats {
        #[arg(short, long)]
        user: Option<String>,

        #[arg(short, long, default_value = "default")]
        session: String,
    },

    /// Search a user's stored conversations
    Search {
        #[arg(short, long)]
        user: String,

        /// Query terms
        query: String,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Clear one session, or every session for a user
    Clear {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        session: Option<String>,
    },
}

pub async fn run(command: MemoryCommand) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let memory = ConversationMemory::new(config.memory);

    match command {
        MemoryCommand::Stats { user, session } => match user {
            Some(user) => match memory.session_stats(&user, &session).await {
                Some(stats) => println!("{}", serde_json::to_string_pretty(&stats)?),
                None => println!("No conversation for user '{user}' session '{session}'"),
            },
            None => {
                let usage = memory.usage().await;
                println!("{}", serde_json::to_string_pretty(&usage)?);
            }
        },
        MemoryCommand::Search { user, query, limit } => {
            let hits = memory.search(&user, &query, limit).await;
            if hits.is_empty() {
                println!("No matches.");
            }
            for hit in hits {
                println!(
                    "[{:.2}] ({}) {}: {}",
                    hit.score, hit.session_id, hit.message.role, hit.message.content
                );
            }
        }
        MemoryCommand::Clear { user, session } => {
            let removed = memory.clear(&user, session.as_deref()).await;
            println!("Cleared {removed} conversation(s).");
        }
    }

    Ok(())
}
