//! HTTP server for the analyzer API

use crate::api::handlers;
use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the router with all routes
pub fn build_router(state: Arc<AppState>) -> Router {
    // Build CORS layer (allow all; the trigger route carries its own secret)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .route("/", get(handlers::health_check))

        // Batch trigger
        .route("/analyze-watchlist", post(handlers::analyze_watchlist))

        // Stored results
        .route("/watchlist-history", get(handlers::watchlist_history))

        // Watchlist
        .route("/watchlist", get(handlers::get_watchlist))
        .route("/watchlist/groups", get(handlers::get_watchlist_groups))

        // Flags
        .route("/emiten/flag", get(handlers::get_flag).post(handlers::set_flag))
        .route("/emiten/flag/events", get(handlers::flag_events))

        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serve the API until `shutdown` resolves
pub async fn serve<F>(state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listen = state.config.listen_addr();
    let addr: SocketAddr = listen
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid address {}: {}", listen, e)))?;

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Watchlist analyzer API listening on {}", listener.local_addr()?);
    info!("  POST http://{}/analyze-watchlist", addr);
    info!("  GET  http://{}/watchlist-history", addr);
    info!("  GET  http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("API server shutting down");
        })
        .await?;

    Ok(())
}
