//! Remote trigger client
//!
//! Posts to a running server's `/analyze-watchlist` with the shared secret,
//! the same call an external cron would make.

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use serde_json::Value;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Batches can take a while; allow well beyond the per-request default
const TRIGGER_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Trigger endpoint for a server base URL
pub fn trigger_endpoint(base_url: &str, group_id: Option<i64>) -> Result<Url> {
    let mut base = base_url.to_string();
    if !base.ends_with('/') {
        base.push('/');
    }

    let mut url = Url::parse(&base)
        .and_then(|u| u.join("analyze-watchlist"))
        .map_err(|e| AppError::Config(format!("Invalid trigger URL {}: {}", base_url, e)))?;

    if let Some(id) = group_id {
        url.query_pairs_mut().append_pair("groupId", &id.to_string());
    }

    Ok(url)
}

/// Trigger a batch on a running server and return its JSON response
pub async fn trigger_remote(config: &AppConfig, group_id: Option<i64>) -> Result<Value> {
    let secret = config
        .trigger_secret
        .as_deref()
        .ok_or_else(|| AppError::Config("CRON_SECRET is not defined".to_string()))?;

    let url = trigger_endpoint(&config.trigger_url, group_id)?;
    info!("Triggering watchlist analysis at {}", url);

    let client = reqwest::Client::builder().timeout(TRIGGER_TIMEOUT).build()?;
    let response = client.post(url).bearer_auth(secret).send().await?;

    let status = response.status();
    let body: Value = response.json().await?;

    if !status.is_success() {
        let message = body
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or("unknown error");
        return Err(AppError::Upstream(format!(
            "Trigger failed with HTTP {}: {}",
            status.as_u16(),
            message
        )));
    }

    Ok(body)
}
