use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{ExpenseRecord, IncomeRecord, PayPeriod};

use super::map_db_error;

/// Income attributed to a project via a polymorphic source reference.
pub const INCOME_SOURCE_PROJECT: &str = "project";

pub struct NewIncome {
    pub amount: f64,
    pub received_on: NaiveDate,
    pub source_type: String,
    pub source_id: Uuid,
}

pub struct NewExpense {
    pub amount: f64,
    pub spent_on: NaiveDate,
    pub project_id: Uuid,
}

pub async fn insert_income(pool: &PgPool, input: &NewIncome) -> Result<IncomeRecord, AppError> {
    sqlx::query_as::<_, IncomeRecord>(
        "INSERT INTO income_records (amount, received_on, source_type, source_id)
         VALUES ($1, $2, $3, $4)
         RETURNING id, amount, received_on, source_type, source_id, profit_shared",
    )
    .bind(input.amount)
    .bind(input.received_on)
    .bind(&input.source_type)
    .bind(input.source_id)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

pub async fn insert_expense(pool: &PgPool, input: &NewExpense) -> Result<ExpenseRecord, AppError> {
    sqlx::query_as::<_, ExpenseRecord>(
        "INSERT INTO expense_records (amount, spent_on, project_id)
         VALUES ($1, $2, $3)
         RETURNING id, amount, spent_on, project_id",
    )
    .bind(input.amount)
    .bind(input.spent_on)
    .bind(input.project_id)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

pub async fn sum_project_income(
    pool: &PgPool,
    project_id: Uuid,
    period: &PayPeriod,
) -> Result<f64, AppError> {
    sqlx::query_scalar::<_, f64>(
        "SELECT COALESCE(SUM(amount), 0)
         FROM income_records
         WHERE source_type = $1 AND source_id = $2
           AND received_on BETWEEN $3 AND $4",
    )
    .bind(INCOME_SOURCE_PROJECT)
    .bind(project_id)
    .bind(period.start)
    .bind(period.end)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

pub async fn sum_project_expenses(
    pool: &PgPool,
    project_id: Uuid,
    period: &PayPeriod,
) -> Result<f64, AppError> {
    sqlx::query_scalar::<_, f64>(
        "SELECT COALESCE(SUM(amount), 0)
         FROM expense_records
         WHERE project_id = $1 AND spent_on BETWEEN $2 AND $3",
    )
    .bind(project_id)
    .bind(period.start)
    .bind(period.end)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

/// Flag the period's income as folded into a distribution. Called by the
/// reconciler only after a successful run with positive profit.
pub async fn mark_income_profit_shared(
    pool: &PgPool,
    project_id: Uuid,
    period: &PayPeriod,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        "UPDATE income_records
         SET profit_shared = true
         WHERE source_type = $1 AND source_id = $2
           AND received_on BETWEEN $3 AND $4
           AND profit_shared = false",
    )
    .bind(INCOME_SOURCE_PROJECT)
    .bind(project_id)
    .bind(period.start)
    .bind(period.end)
    .execute(pool)
    .await
    .map_err(map_db_error)?;

    Ok(result.rows_affected())
}
