//! Scheduled jobs
//!
//! Once a day, at the configured local hour, the overdue sweep assesses
//! penalties and expired passcodes are purged. A failed run is logged and
//! the loop waits for the next day.

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::AppState;

/// Runs the daily jobs once, for the current local date
pub async fn run_daily_jobs(state: &AppState) {
    let now = Utc::now();
    let as_of = state.config.timezone.today(now);

    match state.penalties.process_overdue_bills(as_of).await {
        Ok(report) => info!(
            %as_of,
            scanned = report.scanned,
            penalties_updated = report.penalties_updated,
            marked_overdue = report.marked_overdue,
            failed = report.failed,
            "overdue sweep finished"
        ),
        Err(e) => error!(error = %e, %as_of, "overdue sweep failed"),
    }

    match state.otp.purge_expired(now).await {
        Ok(purged) => info!(purged, "expired passcodes purged"),
        Err(e) => warn!(error = %e, "passcode purge failed"),
    }
}

/// Spawns the daily loop
pub fn spawn_daily_sweep(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = match state
                .config
                .timezone
                .next_daily_run(state.config.sweep_hour, 0, now)
            {
                Ok(next) => next,
                Err(e) => {
                    error!(error = %e, hour = state.config.sweep_hour, "cannot schedule overdue sweep");
                    return;
                }
            };

            info!(next_run = %next, timezone = %state.config.timezone, "overdue sweep scheduled");
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            run_daily_jobs(&state).await;
        }
    })
}
