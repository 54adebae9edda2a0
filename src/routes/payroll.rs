use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::PayPeriod;
use crate::repository::{db_pool, payroll, projects};
use crate::routes::require_internal_key;
use crate::schemas::PeriodQuery;
use crate::services::profit_share::run_project_distribution;
use crate::services::scheduler::run_profit_share_batch;
use crate::state::AppState;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/projects/{project_id}/payroll",
            axum::routing::get(list_project_payroll),
        )
        .route(
            "/projects/{project_id}/payroll/recompute",
            axum::routing::post(recompute_project),
        )
        .route(
            "/payroll/recompute-all",
            axum::routing::post(recompute_all),
        )
        .route(
            "/payroll/{payroll_id}/mark-paid",
            axum::routing::post(mark_paid),
        )
}

fn resolve_period(query: &PeriodQuery) -> AppResult<PayPeriod> {
    match query.period.as_deref() {
        Some(label) => PayPeriod::from_label(label),
        None => Ok(PayPeriod::containing(Utc::now().date_naive())),
    }
}

async fn list_project_payroll(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<PeriodQuery>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let period = resolve_period(&query)?;

    let project = projects::get_project(pool, project_id).await?;
    let records = payroll::list_for_project_period(pool, project.id, &period.label).await?;

    Ok(Json(json!({ "period": period.label, "data": records })))
}

/// On-demand recompute of one project's distribution; returns the full
/// audit summary for the run.
async fn recompute_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<PeriodQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_internal_key(&state, &headers)?;
    let period = resolve_period(&query)?;

    let run = run_project_distribution(&state, project_id, &period, Utc::now().date_naive()).await?;
    Ok(Json(json!({ "data": run })))
}

/// Recompute every active/completed project; per-project failures are
/// reported inline, never abort the batch.
async fn recompute_all(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_internal_key(&state, &headers)?;
    let period = resolve_period(&query)?;

    let entries = run_profit_share_batch(&state, &period, Utc::now().date_naive()).await?;
    Ok(Json(json!({ "period": period.label, "data": entries })))
}

/// Minimal payout surface: freeze a pending/processing record as paid.
/// From this point the reconciler will never modify or delete it.
async fn mark_paid(
    State(state): State<AppState>,
    Path(payroll_id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_internal_key(&state, &headers)?;
    let pool = db_pool(&state)?;

    let record = payroll::mark_paid(pool, payroll_id).await?;
    Ok(Json(json!({ "data": record })))
}
