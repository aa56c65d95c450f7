//! Runtime configuration
//!
//! Everything is read from environment variables. `CRON_SECRET` keeps the
//! name used by the cron trigger so existing deployments keep working.

use crate::error::{AppError, Result};
use chrono_tz::Tz;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PROVIDER_URL: &str = "https://exodus.stockbit.com";

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: String,
    pub port: u16,
    /// Shared secret for the trigger endpoint. `None` disables the check.
    pub trigger_secret: Option<String>,
    /// Refuse to run a batch when no secret is configured
    pub require_secret: bool,
    pub db_path: PathBuf,

    // Upstream provider
    pub provider_base_url: String,
    pub provider_token: Option<String>,
    pub http_timeout: Duration,

    // Scheduling
    pub timezone: Tz,
    pub schedule_enabled: bool,
    pub schedule_hour: u32,
    pub schedule_minute: u32,

    // Batch behaviour
    pub symbol_timeout: Duration,
    pub max_concurrency: usize,

    /// Base URL the `trigger` command posts to
    pub trigger_url: String,
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_str(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env_opt(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {}", name, raw))),
        None => Ok(default),
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    env_opt(name)
        .map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on"))
        .unwrap_or(default)
}

impl AppConfig {
    /// Build configuration from the process environment
    pub fn from_env() -> Result<Self> {
        let port = env_parse("ANALYZER_PORT", 8787u16)?;

        let timezone_name = env_str("ANALYZER_TIMEZONE", "Asia/Jakarta");
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|_| AppError::Config(format!("Unknown time zone: {}", timezone_name)))?;

        let schedule_hour = env_parse("ANALYZER_SCHEDULE_HOUR", 16u32)?;
        let schedule_minute = env_parse("ANALYZER_SCHEDULE_MINUTE", 30u32)?;
        if schedule_hour > 23 || schedule_minute > 59 {
            return Err(AppError::Config(format!(
                "Invalid schedule time {:02}:{:02}",
                schedule_hour, schedule_minute
            )));
        }

        let provider_base_url = env_str("STOCKBIT_BASE_URL", DEFAULT_PROVIDER_URL);
        url::Url::parse(&provider_base_url)
            .map_err(|e| AppError::Config(format!("Invalid STOCKBIT_BASE_URL: {}", e)))?;

        let max_concurrency = env_parse("ANALYZER_MAX_CONCURRENCY", 1usize)?.max(1);

        Ok(Self {
            bind: env_str("ANALYZER_BIND", "127.0.0.1"),
            port,
            trigger_secret: env_opt("CRON_SECRET"),
            require_secret: env_bool("ANALYZER_REQUIRE_SECRET", false),
            db_path: PathBuf::from(env_str("ANALYZER_DB_PATH", "analyzer.db")),
            provider_base_url,
            provider_token: env_opt("STOCKBIT_TOKEN"),
            http_timeout: Duration::from_secs(env_parse("ANALYZER_HTTP_TIMEOUT_SECS", 30u64)?),
            timezone,
            schedule_enabled: env_bool("ANALYZER_SCHEDULE_ENABLED", true),
            schedule_hour,
            schedule_minute,
            symbol_timeout: Duration::from_secs(env_parse("ANALYZER_SYMBOL_TIMEOUT_SECS", 30u64)?),
            max_concurrency,
            trigger_url: env_str("ANALYZER_TRIGGER_URL", &format!("http://127.0.0.1:{}", port)),
        })
    }

    /// Configuration suitable for tests: in-memory friendly, no schedule
    pub fn for_testing() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 0,
            trigger_secret: None,
            require_secret: false,
            db_path: PathBuf::from(":memory:"),
            provider_base_url: DEFAULT_PROVIDER_URL.to_string(),
            provider_token: None,
            http_timeout: Duration::from_secs(5),
            timezone: chrono_tz::Asia::Jakarta,
            schedule_enabled: false,
            schedule_hour: 16,
            schedule_minute: 30,
            symbol_timeout: Duration::from_secs(5),
            max_concurrency: 1,
            trigger_url: "http://127.0.0.1:8787".to_string(),
        }
    }

    /// Socket address string for the API server
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
