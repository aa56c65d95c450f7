//! REST API server module
//!
//! Provides:
//! - The batch trigger (`POST /analyze-watchlist`), guarded by a shared secret
//! - Read routes for history, watchlist and flags
//! - A server-sent event stream of flag updates

mod auth;
pub mod handlers;
mod server;
mod types;

pub use server::{build_router, serve};
pub use types::{ApiError, ApiResponse};
