//! Watchlist Analyzer - daily smart-money target analysis
//!
//! Pulls broker-accumulation and order-book snapshots for every symbol on a
//! tracked watchlist, derives target price levels and records one row per
//! symbol per day in SQLite. Runs as an HTTP service with an in-process
//! daily scheduler, or as a one-shot batch.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod provider;
pub mod scheduler;
pub mod services;
pub mod state;

use config::AppConfig;
use error::Result;
use scheduler::DailyAnalysisScheduler;
use services::{AnalysisService, BatchSummary};
use state::AppState;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "watchlist_analyzer=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Run the API server and the daily scheduler until Ctrl-C
pub async fn run(config: AppConfig) -> Result<()> {
    tracing::info!("Starting Watchlist Analyzer...");

    let state = Arc::new(AppState::new(config)?);
    tracing::info!("Application state initialized");

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let scheduler = if state.config.schedule_enabled {
        Some(DailyAnalysisScheduler::new(state.clone()).start(shutdown_tx.subscribe()))
    } else {
        tracing::info!("Daily analysis scheduler is disabled");
        None
    };

    let signal_tx = shutdown_tx.clone();
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        tracing::info!("Shutdown signal received");
        let _ = signal_tx.send(());
    };

    let served = api::serve(state, shutdown).await;

    // Stop the scheduler even when the server exited on its own
    let _ = shutdown_tx.send(());
    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            tracing::warn!("Scheduler task ended abnormally: {}", e);
        }
    }

    served
}

/// Run a single batch in-process and return its summary
pub async fn run_once(config: AppConfig, group_id: Option<i64>) -> Result<BatchSummary> {
    let state = AppState::new(config)?;
    AnalysisService::run_batch(&state, group_id).await
}
