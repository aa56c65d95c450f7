//! Daily analysis scheduler
//!
//! Runs the watchlist batch once per trading day at the configured local
//! time (default 16:30 Asia/Jakarta, after the IDX close). Saturdays and
//! Sundays are skipped.

use crate::services::AnalysisService;
use crate::state::AppState;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Scheduler that triggers the batch once per trading day
pub struct DailyAnalysisScheduler {
    state: Arc<AppState>,
}

impl DailyAnalysisScheduler {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Next weekday run strictly after `now`, at `hour:minute` local time
    pub fn next_run_after(now: DateTime<Tz>, hour: u32, minute: u32) -> Option<DateTime<Tz>> {
        let target_time = NaiveTime::from_hms_opt(hour, minute, 0)?;
        let tz = now.timezone();
        let mut date = now.date_naive();

        // A week always contains a valid weekday slot
        for _ in 0..8 {
            let is_weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
            if !is_weekend {
                if let Some(candidate) = tz.from_local_datetime(&date.and_time(target_time)).earliest() {
                    if candidate > now {
                        return Some(candidate);
                    }
                }
            }
            date = date.succ_opt()?;
        }

        None
    }

    /// Duration until the next scheduled run
    pub fn duration_until_next_run(&self) -> Option<Duration> {
        let config = &self.state.config;
        let now = Utc::now().with_timezone(&config.timezone);
        let next = Self::next_run_after(now, config.schedule_hour, config.schedule_minute)?;
        (next - now).max(ChronoDuration::zero()).to_std().ok()
    }

    /// Start the scheduler
    ///
    /// Spawns a task that sleeps until the next run, runs the batch and
    /// repeats until `shutdown` fires.
    pub fn start(self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Daily analysis scheduler started ({:02}:{:02} {})",
                self.state.config.schedule_hour,
                self.state.config.schedule_minute,
                self.state.config.timezone
            );

            loop {
                let Some(duration) = self.duration_until_next_run() else {
                    error!("Could not compute the next analysis time; scheduler stopped");
                    return;
                };
                info!(
                    "Next analysis in {} hours {} minutes",
                    duration.as_secs() / 3600,
                    (duration.as_secs() % 3600) / 60
                );

                tokio::select! {
                    _ = tokio::time::sleep(duration) => {
                        self.execute().await;
                    }
                    _ = shutdown.recv() => {
                        info!("Daily analysis scheduler stopped");
                        return;
                    }
                }
            }
        })
    }

    async fn execute(&self) {
        info!("Executing scheduled watchlist analysis");

        match AnalysisService::run_batch(&self.state, None).await {
            Ok(summary) => info!(
                "Scheduled analysis completed: {} analyzed, {} errors",
                summary.analyzed, summary.errors
            ),
            Err(e) => warn!("Scheduled analysis failed: {}", e),
        }
    }
}
