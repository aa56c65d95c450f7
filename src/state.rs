//! Application state management

use crate::config::AppConfig;
use crate::db::sqlite::models::SymbolFlag;
use crate::db::sqlite::{SqliteDb, PROVIDER_TOKEN_KEY};
use crate::error::Result;
use crate::provider::stockbit::StockbitClient;
use crate::provider::{MarketDataGateway, WatchlistSource};
use crate::services::analysis_service::BatchSummary;
use crate::services::target_calculator::{SmartMoneyCalculator, TargetCalculator};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// Buffered flag events per subscriber before it starts lagging
const FLAG_EVENT_CAPACITY: usize = 64;

/// Application state shared by the API server, scheduler and CLI
pub struct AppState {
    pub config: AppConfig,

    /// SQLite database connection
    pub sqlite: Arc<SqliteDb>,

    /// Market data provider
    pub gateway: Arc<dyn MarketDataGateway>,

    /// Watchlist provider
    pub watchlist: Arc<dyn WatchlistSource>,

    pub calculator: Arc<dyn TargetCalculator>,

    /// Publisher for flag updates; subscribers are SSE streams
    pub flag_events: broadcast::Sender<SymbolFlag>,

    /// Summary of the most recent completed batch
    pub last_run: RwLock<Option<BatchSummary>>,

    /// Held for the duration of a batch
    pub run_lock: Mutex<()>,
}

impl AppState {
    /// Create application state backed by the Stockbit client
    pub fn new(config: AppConfig) -> Result<Self> {
        tracing::info!("Database path: {:?}", config.db_path);
        let sqlite = Arc::new(SqliteDb::new(&config.db_path)?);

        let token = resolve_provider_token(&config, &sqlite)?;
        let client = Arc::new(
            StockbitClient::new(&config.provider_base_url, token, config.http_timeout)?
                .with_session_store(sqlite.clone()),
        );

        Ok(Self::with_components(config, sqlite, client.clone(), client))
    }

    /// Create application state from explicit components
    pub fn with_components(
        config: AppConfig,
        sqlite: Arc<SqliteDb>,
        gateway: Arc<dyn MarketDataGateway>,
        watchlist: Arc<dyn WatchlistSource>,
    ) -> Self {
        let (flag_events, _) = broadcast::channel(FLAG_EVENT_CAPACITY);

        Self {
            config,
            sqlite,
            gateway,
            watchlist,
            calculator: Arc::new(SmartMoneyCalculator),
            flag_events,
            last_run: RwLock::new(None),
            run_lock: Mutex::new(()),
        }
    }

    pub fn get_last_run(&self) -> Option<BatchSummary> {
        self.last_run.read().clone()
    }

    pub fn set_last_run(&self, summary: BatchSummary) {
        *self.last_run.write() = Some(summary);
    }

    /// Check if a batch is currently running
    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    pub fn subscribe_flags(&self) -> broadcast::Receiver<SymbolFlag> {
        self.flag_events.subscribe()
    }
}

/// Provider token from the environment, else the one saved in the session table
///
/// A token supplied through the environment is saved so later restarts
/// without it keep working.
fn resolve_provider_token(config: &AppConfig, sqlite: &SqliteDb) -> Result<Option<String>> {
    if let Some(ref token) = config.provider_token {
        sqlite.upsert_session(PROVIDER_TOKEN_KEY, token)?;
        return Ok(Some(token.clone()));
    }

    let stored = sqlite.get_session_value(PROVIDER_TOKEN_KEY)?;
    if stored.is_none() {
        tracing::warn!("No provider token configured; market data requests will fail");
    }
    Ok(stored)
}
