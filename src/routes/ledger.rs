use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::error::AppResult;
use crate::repository::ledger::{NewExpense, NewIncome, INCOME_SOURCE_PROJECT};
use crate::repository::{db_pool, ledger, projects};
use crate::schemas::{validate_input, CreateExpenseInput, CreateIncomeInput};
use crate::services::profit_share::spawn_current_period_recompute;
use crate::state::AppState;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/income", axum::routing::post(create_income))
        .route("/expenses", axum::routing::post(create_expense))
}

/// Record project income. Side effect: the project's current-period
/// distribution is recomputed in the background.
async fn create_income(
    State(state): State<AppState>,
    Json(payload): Json<CreateIncomeInput>,
) -> AppResult<impl IntoResponse> {
    validate_input(&payload)?;
    let pool = db_pool(&state)?;

    let project = projects::get_project(pool, payload.project_id).await?;
    let created = ledger::insert_income(
        pool,
        &NewIncome {
            amount: payload.amount,
            received_on: payload.received_on,
            source_type: INCOME_SOURCE_PROJECT.to_string(),
            source_id: project.id,
        },
    )
    .await?;

    spawn_current_period_recompute(state.clone(), project.id);

    Ok((StatusCode::CREATED, Json(json!({ "data": created }))))
}

/// Record a project expense; triggers the same background recompute.
async fn create_expense(
    State(state): State<AppState>,
    Json(payload): Json<CreateExpenseInput>,
) -> AppResult<impl IntoResponse> {
    validate_input(&payload)?;
    let pool = db_pool(&state)?;

    let project = projects::get_project(pool, payload.project_id).await?;
    let created = ledger::insert_expense(
        pool,
        &NewExpense {
            amount: payload.amount,
            spent_on: payload.spent_on,
            project_id: project.id,
        },
    )
    .await?;

    spawn_current_period_recompute(state.clone(), project.id);

    Ok((StatusCode::CREATED, Json(json!({ "data": created }))))
}
