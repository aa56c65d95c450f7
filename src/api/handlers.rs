//! REST API endpoint handlers

use crate::api::auth::authorize_trigger;
use crate::api::types::*;
use crate::db::sqlite::models::SymbolFlag;
use crate::provider::types::WatchlistGroup;
use crate::services::{
    AnalysisService, BatchSummary, FlagService, HistoryParams, HistoryResult, HistoryService,
    WatchlistService, WatchlistView,
};
use crate::state::AppState;
use axum::{
    extract::{Json, Query, State},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

// ============================================================================
// Health Check
// ============================================================================

/// Health check endpoint - GET /health or GET /
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<HealthData> {
    Ok(Json(ApiResponse::success_with_data(HealthData {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        running: state.is_running(),
        last_run: state.get_last_run(),
    })))
}

// ============================================================================
// Batch trigger
// ============================================================================

/// Run the watchlist analysis - POST /analyze-watchlist
///
/// Requires `Authorization: Bearer <CRON_SECRET>` when a secret is set.
pub async fn analyze_watchlist(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<GroupQuery>,
) -> ApiResult<BatchSummary> {
    if let Err(e) = authorize_trigger(&state.config, &headers) {
        warn!("Rejected analysis trigger: {}", e);
        return Err(e.into());
    }

    info!("Analysis triggered over HTTP");
    let summary = AnalysisService::run_batch(&state, query.group_id).await?;
    Ok(Json(ApiResponse::success_with_data(summary)))
}

// ============================================================================
// History
// ============================================================================

/// Stored analysis rows - GET /watchlist-history
pub async fn watchlist_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<HistoryResult> {
    let filter = params.into_filter()?;
    let result = HistoryService::query(&state, filter)?;
    Ok(Json(ApiResponse::success_with_data(result)))
}

// ============================================================================
// Watchlist
// ============================================================================

/// Watchlist with sector and flag - GET /watchlist
pub async fn get_watchlist(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GroupQuery>,
) -> ApiResult<ListData<WatchlistView>> {
    let data = WatchlistService::list(&state, query.group_id).await?;
    Ok(Json(ApiResponse::success_with_data(ListData { data })))
}

/// Watchlist groups - GET /watchlist/groups
pub async fn get_watchlist_groups(
    State(state): State<Arc<AppState>>,
) -> ApiResult<ListData<WatchlistGroup>> {
    let data = WatchlistService::groups(&state).await?;
    Ok(Json(ApiResponse::success_with_data(ListData { data })))
}

// ============================================================================
// Flags
// ============================================================================

/// Set a symbol flag - POST /emiten/flag
///
/// Responds with the saved row under `data`.
pub async fn set_flag(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FlagRequest>,
) -> ApiResult<SavedFlagData> {
    let data = FlagService::set_flag(&state, request.emiten.as_deref(), request.flag.as_deref())?;
    Ok(Json(ApiResponse::success_with_data(SavedFlagData { data })))
}

/// Get a symbol flag - GET /emiten/flag?emiten=
pub async fn get_flag(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FlagQuery>,
) -> ApiResult<FlagData> {
    let flag = FlagService::get_flag(&state, query.emiten.as_deref())?;
    Ok(Json(ApiResponse::success_with_data(FlagData { flag })))
}

/// Stream of flag updates - GET /emiten/flag/events
pub async fn flag_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    Sse::new(flag_event_stream(state.subscribe_flags())).keep_alive(KeepAlive::default())
}

fn flag_event_stream(
    rx: tokio::sync::broadcast::Receiver<SymbolFlag>,
) -> impl Stream<Item = std::result::Result<Event, Infallible>> {
    stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(flag) => match Event::default().event("flag").json_data(&flag) {
                    Ok(event) => return Some((Ok(event), rx)),
                    Err(e) => warn!("Failed to encode flag event: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Flag event subscriber lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}
