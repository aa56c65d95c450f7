//! API request and response types

use crate::db::sqlite::models::{FlagValue, SymbolFlag};
use crate::error::AppError;
use crate::services::BatchSummary;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Standard response envelope
///
/// The payload's fields are flattened next to `success`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success_with_data(data: T) -> Self {
        Self {
            success: true,
            error: None,
            data: Some(data),
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            success: false,
            error: Some(message.to_string()),
            data: None,
        }
    }
}

/// Empty payload
#[derive(Debug, Serialize)]
pub struct Empty {}

/// List payload, serialized as `data`
#[derive(Debug, Serialize)]
pub struct ListData<T: Serialize> {
    pub data: Vec<T>,
}

/// Flag value only, `null` when the symbol was never flagged
#[derive(Debug, Serialize)]
pub struct FlagData {
    pub flag: Option<FlagValue>,
}

#[derive(Debug, Serialize)]
pub struct SavedFlagData {
    pub data: SymbolFlag,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub running: bool,
    pub last_run: Option<BatchSummary>,
}

/// Query for the trigger and watchlist routes
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupQuery {
    pub group_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlagQuery {
    pub emiten: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlagRequest {
    pub emiten: Option<String>,
    pub flag: Option<String>,
}

/// Error returned from handlers, rendered as `{success:false, error}`
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to clients
    pub fn message(&self) -> String {
        match &self.0 {
            AppError::Auth(_) => "Unauthorized".to_string(),
            AppError::Validation(msg) | AppError::NotFound(msg) | AppError::Conflict(msg) => {
                msg.clone()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.0.code(), "Request failed: {}", self.0);
        } else {
            tracing::debug!(code = self.0.code(), "Request rejected: {}", self.0);
        }
        (status, Json(ApiResponse::<Empty>::error(&self.message()))).into_response()
    }
}
