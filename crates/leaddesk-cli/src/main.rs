mod replay;
mod score;
mod watch;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "leaddesk-cli")]
#[command(about = "Lead intake operator tooling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract and score a saved webhook payload offline (deterministic scorer)
    Score {
        /// Path to the JSON payload, or `-` for stdin
        payload: PathBuf,
        /// Keyword override file (YAML)
        #[arg(long, env = "LEADDESK_KEYWORDS_PATH")]
        keywords: Option<PathBuf>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Follow the live lead feed of a running server
    Watch {
        /// Server base URL
        #[arg(long, env = "LEADDESK_URL", default_value = "http://localhost:3000")]
        url: String,
    },
    /// Re-run the pipeline for a stored lead event
    Replay {
        /// Id of the lead event to reprocess
        event_id: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Score {
            payload,
            keywords,
            json,
        } => score::run_score(&payload, keywords.as_deref(), json),
        Commands::Watch { url } => watch::run_watch(&url).await,
        Commands::Replay { event_id } => replay::run_replay(event_id).await,
    }
}
