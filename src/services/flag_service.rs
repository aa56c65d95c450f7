//! Flag Service
//!
//! Manual OK/NG/Neutral classification of symbols. Every accepted update is
//! published on the state's flag channel.

use crate::db::sqlite::models::{FlagValue, SymbolFlag};
use crate::error::{AppError, Result};
use crate::state::AppState;
use tracing::{debug, info};

/// Flag service for business logic
pub struct FlagService;

impl FlagService {
    /// Validate, store and publish a flag
    pub fn set_flag(state: &AppState, emiten: Option<&str>, flag: Option<&str>) -> Result<SymbolFlag> {
        let symbol = required_symbol(emiten)
            .ok_or_else(|| AppError::Validation("emiten and flag are required".to_string()))?;
        let flag = flag
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or_else(|| AppError::Validation("emiten and flag are required".to_string()))?;
        let flag = FlagValue::parse(flag)?;

        info!("FlagService::set_flag - {} = {}", symbol, flag.as_str());

        let saved = state.sqlite.upsert_flag(&symbol, flag)?;

        // No subscribers is fine
        if state.flag_events.send(saved.clone()).is_err() {
            debug!("No flag event subscribers");
        }

        Ok(saved)
    }

    /// Current flag value, `None` when never set
    pub fn get_flag(state: &AppState, emiten: Option<&str>) -> Result<Option<FlagValue>> {
        let symbol = required_symbol(emiten)
            .ok_or_else(|| AppError::Validation("emiten is required".to_string()))?;
        Ok(state.sqlite.get_flag(&symbol)?.map(|saved| saved.flag))
    }
}

fn required_symbol(emiten: Option<&str>) -> Option<String> {
    emiten
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn test_state() -> AppState {
        AppState::new(AppConfig::for_testing()).unwrap()
    }

    #[tokio::test]
    async fn test_set_flag_uppercases_and_publishes() {
        let state = test_state();
        let mut events = state.subscribe_flags();

        let saved = FlagService::set_flag(&state, Some("bbca"), Some("OK")).unwrap();
        assert_eq!(saved.symbol, "BBCA");

        let event = events.recv().await.unwrap();
        assert_eq!(event.symbol, "BBCA");
        assert_eq!(event.flag, FlagValue::Ok);

        let stored = FlagService::get_flag(&state, Some("bbca")).unwrap();
        assert_eq!(stored, Some(FlagValue::Ok));
    }

    #[test]
    fn test_set_flag_validation() {
        let state = test_state();

        let missing = FlagService::set_flag(&state, None, Some("OK")).unwrap_err();
        assert_eq!(missing.to_string(), "Validation error: emiten and flag are required");

        let invalid = FlagService::set_flag(&state, Some("BBCA"), Some("ok")).unwrap_err();
        assert!(invalid.to_string().contains("Must be OK, NG, or Neutral"));

        assert!(FlagService::get_flag(&state, Some("  ")).is_err());
        assert!(FlagService::get_flag(&state, Some("TLKM")).unwrap().is_none());
    }
}
