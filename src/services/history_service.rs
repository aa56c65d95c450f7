//! History Service
//!
//! Read access to stored analysis rows with filtering and pagination.

use crate::db::sqlite::models::{AnalysisRow, AnalysisStatus, HistoryFilter};
use crate::error::{AppError, Result};
use crate::state::AppState;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Raw history query parameters as received over HTTP
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    pub emiten: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl HistoryParams {
    /// Validate and convert into a store filter
    ///
    /// Empty strings count as absent.
    pub fn into_filter(self) -> Result<HistoryFilter> {
        let symbol = non_empty(self.emiten).map(|s| s.to_uppercase());
        let from_date = non_empty(self.from_date)
            .map(|s| parse_date("fromDate", &s))
            .transpose()?;
        let to_date = non_empty(self.to_date)
            .map(|s| parse_date("toDate", &s))
            .transpose()?;
        let status = non_empty(self.status)
            .map(|s| AnalysisStatus::parse(&s))
            .transpose()?;

        let limit = self.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        if limit < 1 {
            return Err(AppError::Validation("limit must be at least 1".to_string()));
        }
        let offset = self.offset.unwrap_or(0);
        if offset < 0 {
            return Err(AppError::Validation("offset must not be negative".to_string()));
        }

        Ok(HistoryFilter {
            symbol,
            from_date,
            to_date,
            status,
            limit,
            offset,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_date(name: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        AppError::Validation(format!("{} must be a date in YYYY-MM-DD format", name))
    })
}

/// History result
#[derive(Debug, Clone, Serialize)]
pub struct HistoryResult {
    pub data: Vec<AnalysisRow>,
    /// Total matching rows, independent of limit/offset
    pub count: i64,
    pub filters: HistoryFilter,
}

/// History service for business logic
pub struct HistoryService;

impl HistoryService {
    pub fn query(state: &AppState, filter: HistoryFilter) -> Result<HistoryResult> {
        info!("HistoryService::query - {:?}", filter);

        let (data, count) = state.sqlite.query_history(&filter)?;

        Ok(HistoryResult {
            data,
            count,
            filters: filter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let filter = HistoryParams::default().into_filter().unwrap();
        assert_eq!(filter.limit, DEFAULT_HISTORY_LIMIT);
        assert_eq!(filter.offset, 0);
        assert!(filter.symbol.is_none());
        assert!(filter.status.is_none());
    }

    #[test]
    fn test_parses_and_normalizes() {
        let params = HistoryParams {
            emiten: Some(" bbca ".to_string()),
            from_date: Some("2024-06-01".to_string()),
            to_date: Some(String::new()),
            status: Some("error".to_string()),
            limit: Some(10),
            offset: Some(20),
        };
        let filter = params.into_filter().unwrap();
        assert_eq!(filter.symbol.as_deref(), Some("BBCA"));
        assert_eq!(filter.from_date, NaiveDate::from_ymd_opt(2024, 6, 1));
        assert_eq!(filter.to_date, None);
        assert_eq!(filter.status, Some(AnalysisStatus::Error));
        assert_eq!((filter.limit, filter.offset), (10, 20));
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad_date = HistoryParams {
            from_date: Some("06/01/2024".to_string()),
            ..Default::default()
        };
        assert!(matches!(bad_date.into_filter(), Err(AppError::Validation(_))));

        let bad_status = HistoryParams {
            status: Some("pending".to_string()),
            ..Default::default()
        };
        assert!(matches!(bad_status.into_filter(), Err(AppError::Validation(_))));

        let bad_limit = HistoryParams {
            limit: Some(0),
            ..Default::default()
        };
        assert!(bad_limit.into_filter().is_err());
    }
}
