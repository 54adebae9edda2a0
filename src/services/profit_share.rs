use chrono::{NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::PayPeriod;
use crate::repository::{db_pool, projects, users};
use crate::services::aggregation::aggregate_project_finances;
use crate::services::distribution::distribute;
use crate::services::membership::resolve_participants;
use crate::services::reconciliation::{reconcile_project_payroll, ReconcileSummary};
use crate::state::AppState;

/// Audit summary of one full pipeline run for a project and period.
#[derive(Debug, Clone, Serialize)]
pub struct DistributionRun {
    pub project_id: Uuid,
    pub period: String,
    pub total_income: f64,
    pub total_expenses: f64,
    pub profit: f64,
    pub founder_user_id: Option<Uuid>,
    pub founder_share: f64,
    /// Profit was positive but no active founder exists; the 70% founder
    /// cut was left unassigned on purpose.
    pub founder_missing: bool,
    pub owner_bonus: f64,
    pub eligible_count: usize,
    pub reconcile: ReconcileSummary,
}

/// Run aggregate → resolve → distribute → reconcile for one project.
///
/// Holds the per-`(project, period)` lock for the whole run so a manual
/// trigger, a ledger hook, and the daily batch can never interleave their
/// reads and writes on the same payroll record set.
pub async fn run_project_distribution(
    state: &AppState,
    project_id: Uuid,
    period: &PayPeriod,
    today: NaiveDate,
) -> AppResult<DistributionRun> {
    let pool = db_pool(state)?;
    let _guard = state.recon_locks.acquire(project_id, &period.label).await;

    let project = projects::get_project(pool, project_id).await?;
    let financials = aggregate_project_finances(pool, project_id, period).await?;
    let roster = projects::list_roster(pool, project_id).await?;
    let founder = users::find_active_founder(pool).await?;

    let participants = resolve_participants(
        &roster,
        project.owner_user_id,
        founder.as_ref().map(|f| f.id),
        period,
        today,
    );
    let distribution = distribute(
        financials.profit,
        founder.as_ref().map(|f| f.id),
        &participants,
    );

    if distribution.founder_missing() {
        tracing::warn!(
            project_id = %project_id,
            period = %period,
            founder_share = distribution.founder_share,
            "No active founder: founder share left undistributed"
        );
    }

    let reconcile =
        reconcile_project_payroll(pool, &project, period, &distribution, financials).await?;

    let run = DistributionRun {
        project_id,
        period: period.label.clone(),
        total_income: financials.total_income,
        total_expenses: financials.total_expenses,
        profit: financials.profit,
        founder_user_id: founder.map(|f| f.id),
        founder_share: distribution.founder_share,
        founder_missing: distribution.founder_missing(),
        owner_bonus: distribution.owner_bonus,
        eligible_count: distribution.payouts.len(),
        reconcile,
    };

    tracing::info!(
        project_id = %run.project_id,
        period = %run.period,
        profit = run.profit,
        founder_share = run.founder_share,
        eligible = run.eligible_count,
        "Profit distribution completed"
    );

    Ok(run)
}

/// Fire-and-forget recompute of the current period, used as the side effect
/// of recording income or an expense. Errors are logged, never surfaced to
/// the ledger request that triggered them.
pub fn spawn_current_period_recompute(state: AppState, project_id: Uuid) {
    tokio::spawn(async move {
        let today = Utc::now().date_naive();
        let period = PayPeriod::containing(today);
        if let Err(error) = run_project_distribution(&state, project_id, &period, today).await {
            tracing::warn!(
                project_id = %project_id,
                period = %period,
                error = %error,
                "Ledger-triggered recompute failed"
            );
        }
    });
}
