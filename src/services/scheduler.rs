use std::time::Duration;

use chrono::{NaiveDate, Timelike, Utc};
use serde::Serialize;
use tokio::time::sleep;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::PayPeriod;
use crate::repository::{db_pool, projects};
use crate::services::profit_share::{run_project_distribution, DistributionRun};
use crate::state::AppState;

/// Outcome of one project inside a batch run. A failed project never
/// aborts the rest of the batch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchEntry {
    Completed(DistributionRun),
    Failed { project_id: Uuid, error: String },
}

/// Run the profit-share pipeline for every active or completed project.
pub async fn run_profit_share_batch(
    state: &AppState,
    period: &PayPeriod,
    today: NaiveDate,
) -> AppResult<Vec<BatchEntry>> {
    let pool = db_pool(state)?;
    let candidates = projects::list_distributable_projects(pool).await?;
    let timeout = Duration::from_secs(state.config.profit_share_project_timeout_seconds.max(1));

    let mut entries = Vec::with_capacity(candidates.len());
    for project in candidates {
        let outcome =
            tokio::time::timeout(timeout, run_project_distribution(state, project.id, period, today))
                .await;
        let entry = match outcome {
            Ok(Ok(run)) => BatchEntry::Completed(run),
            Ok(Err(error)) => {
                tracing::warn!(
                    project_id = %project.id,
                    period = %period,
                    error = %error,
                    "Profit-share run failed for project"
                );
                BatchEntry::Failed {
                    project_id: project.id,
                    error: error.to_string(),
                }
            }
            Err(_) => {
                tracing::warn!(
                    project_id = %project.id,
                    period = %period,
                    "Profit-share run timed out"
                );
                BatchEntry::Failed {
                    project_id: project.id,
                    error: "Distribution run timed out.".to_string(),
                }
            }
        };
        entries.push(entry);
    }

    let failed = entries
        .iter()
        .filter(|entry| matches!(entry, BatchEntry::Failed { .. }))
        .count();
    tracing::info!(
        period = %period,
        total = entries.len(),
        failed,
        "Profit-share batch completed"
    );

    Ok(entries)
}

/// Background scheduler: run the batch once at startup (configurable), then
/// once per calendar day at or after the configured UTC hour. Owned by the
/// task handle `main` spawns; dies with the process on graceful shutdown.
pub async fn run_background_scheduler(state: AppState) {
    tracing::info!(
        run_hour_utc = state.config.profit_share_run_hour_utc,
        "Profit-share scheduler started"
    );

    if state.db_pool.is_none() {
        tracing::warn!("Scheduler: no database pool configured, exiting");
        return;
    }

    let mut last_daily_run: Option<NaiveDate> = None;

    if state.config.profit_share_run_on_start {
        let today = Utc::now().date_naive();
        run_scheduled_batch(&state, today).await;
        last_daily_run = Some(today);
    }

    loop {
        sleep(Duration::from_secs(60)).await;

        let now = Utc::now();
        let today = now.date_naive();
        if last_daily_run == Some(today) {
            continue;
        }
        if now.hour() < state.config.profit_share_run_hour_utc {
            continue;
        }

        last_daily_run = Some(today);
        run_scheduled_batch(&state, today).await;
    }
}

async fn run_scheduled_batch(state: &AppState, today: NaiveDate) {
    let period = PayPeriod::containing(today);
    tracing::info!(period = %period, "Scheduler: running daily profit-share batch");
    if let Err(error) = run_profit_share_batch(state, &period, today).await {
        tracing::error!(period = %period, error = %error, "Scheduler: batch failed to start");
    }
}
