//! Command-line entry point for the watchlist analyzer

use clap::{Parser, Subcommand};
use tracing::info;
use watchlist_analyzer::config::AppConfig;
use watchlist_analyzer::scheduler::trigger_remote;

#[derive(Parser, Debug)]
#[command(name = "watchlist-analyzer")]
#[command(about = "Daily smart-money analysis for a tracked watchlist", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the API server and the daily scheduler (default)
    Serve,
    /// Analyze the watchlist once and exit
    RunOnce {
        /// Watchlist group id; the default group when omitted
        #[arg(long)]
        group_id: Option<i64>,
    },
    /// Ask a running server to analyze the watchlist
    Trigger {
        /// Watchlist group id; the default group when omitted
        #[arg(long)]
        group_id: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine
    dotenv::dotenv().ok();

    watchlist_analyzer::init_tracing();

    let args = Args::parse();
    let config = AppConfig::from_env()?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => watchlist_analyzer::run(config).await?,
        Command::RunOnce { group_id } => {
            let summary = watchlist_analyzer::run_once(config, group_id).await?;
            info!(
                "Analysis for {} finished: {} analyzed, {} errors",
                summary.date, summary.analyzed, summary.errors
            );
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Trigger { group_id } => {
            let response = trigger_remote(&config, group_id).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
