use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::PayrollRecord;

use super::map_db_error;

const PAYROLL_COLUMNS: &str = "id, user_id, project_id, period, base_salary, profit_share, \
     bonuses, deductions, net_amount, status, work_duration_days, member_joined_date, \
     member_left_date, is_project_owner, owner_bonus, share_percent, project_income, \
     project_expenses, net_profit";

/// Row seed for a recipient who has no payroll record for the period yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayrollRecord {
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub period: String,
    pub base_salary: f64,
    pub profit_share: f64,
    pub net_amount: f64,
    pub work_duration_days: i32,
    pub member_joined_date: NaiveDate,
    pub member_left_date: Option<NaiveDate>,
    pub is_project_owner: bool,
    pub owner_bonus: f64,
    pub share_percent: Option<f64>,
    pub project_income: f64,
    pub project_expenses: f64,
    pub net_profit: f64,
}

/// Recomputed fields for an existing, not-yet-paid record. Manually managed
/// fields (`bonuses`, `deductions`, `base_salary`, `status`) are left alone;
/// `net_amount` is re-derived by the planner from the kept values.
#[derive(Debug, Clone, PartialEq)]
pub struct PayrollPatch {
    pub record_id: Uuid,
    pub profit_share: f64,
    pub net_amount: f64,
    pub work_duration_days: i32,
    pub member_joined_date: NaiveDate,
    pub member_left_date: Option<NaiveDate>,
    pub is_project_owner: bool,
    pub owner_bonus: f64,
    pub share_percent: Option<f64>,
    pub project_income: f64,
    pub project_expenses: f64,
    pub net_profit: f64,
}

pub async fn list_for_project_period(
    pool: &PgPool,
    project_id: Uuid,
    period: &str,
) -> Result<Vec<PayrollRecord>, AppError> {
    sqlx::query_as::<_, PayrollRecord>(&format!(
        "SELECT {PAYROLL_COLUMNS}
         FROM payroll_records
         WHERE project_id = $1 AND period = $2
         ORDER BY created_at ASC"
    ))
    .bind(project_id)
    .bind(period)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)
}

pub async fn get_record(pool: &PgPool, record_id: Uuid) -> Result<PayrollRecord, AppError> {
    sqlx::query_as::<_, PayrollRecord>(&format!(
        "SELECT {PAYROLL_COLUMNS} FROM payroll_records WHERE id = $1"
    ))
    .bind(record_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound(format!("Payroll record {record_id} not found.")))
}

pub async fn insert_record(
    pool: &PgPool,
    record: &NewPayrollRecord,
) -> Result<PayrollRecord, AppError> {
    sqlx::query_as::<_, PayrollRecord>(&format!(
        "INSERT INTO payroll_records
            (user_id, project_id, period, base_salary, profit_share, net_amount,
             status, work_duration_days, member_joined_date, member_left_date,
             is_project_owner, owner_bonus, share_percent, project_income,
             project_expenses, net_profit)
         VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $8, $9, $10, $11, $12, $13, $14, $15)
         RETURNING {PAYROLL_COLUMNS}"
    ))
    .bind(record.user_id)
    .bind(record.project_id)
    .bind(&record.period)
    .bind(record.base_salary)
    .bind(record.profit_share)
    .bind(record.net_amount)
    .bind(record.work_duration_days)
    .bind(record.member_joined_date)
    .bind(record.member_left_date)
    .bind(record.is_project_owner)
    .bind(record.owner_bonus)
    .bind(record.share_percent)
    .bind(record.project_income)
    .bind(record.project_expenses)
    .bind(record.net_profit)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

/// Apply a recompute patch. The `status <> 'paid'` guard repeats the
/// planner's check at the store boundary so a record paid between plan and
/// apply is still protected.
pub async fn apply_patch(pool: &PgPool, patch: &PayrollPatch) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE payroll_records
         SET profit_share = $2, net_amount = $3, work_duration_days = $4,
             member_joined_date = $5, member_left_date = $6, is_project_owner = $7,
             owner_bonus = $8, share_percent = $9, project_income = $10,
             project_expenses = $11, net_profit = $12, updated_at = now()
         WHERE id = $1 AND status <> 'paid'",
    )
    .bind(patch.record_id)
    .bind(patch.profit_share)
    .bind(patch.net_amount)
    .bind(patch.work_duration_days)
    .bind(patch.member_joined_date)
    .bind(patch.member_left_date)
    .bind(patch.is_project_owner)
    .bind(patch.owner_bonus)
    .bind(patch.share_percent)
    .bind(patch.project_income)
    .bind(patch.project_expenses)
    .bind(patch.net_profit)
    .execute(pool)
    .await
    .map_err(map_db_error)?;

    Ok(result.rows_affected() > 0)
}

/// Delete a record for a no-longer-eligible recipient. Paid rows are never
/// deleted, even if the planner raced a concurrent payout.
pub async fn delete_unpaid_record(pool: &PgPool, record_id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM payroll_records WHERE id = $1 AND status <> 'paid'")
        .bind(record_id)
        .execute(pool)
        .await
        .map_err(map_db_error)?;

    Ok(result.rows_affected() > 0)
}

/// Transition pending/processing → paid. Freezes the record against the
/// reconciler from then on.
pub async fn mark_paid(pool: &PgPool, record_id: Uuid) -> Result<PayrollRecord, AppError> {
    let updated = sqlx::query_as::<_, PayrollRecord>(&format!(
        "UPDATE payroll_records
         SET status = 'paid', updated_at = now()
         WHERE id = $1 AND status IN ('pending', 'processing')
         RETURNING {PAYROLL_COLUMNS}"
    ))
    .bind(record_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?;

    match updated {
        Some(record) => Ok(record),
        None => {
            let existing = get_record(pool, record_id).await?;
            Err(AppError::Conflict(format!(
                "Payroll record {record_id} is {status:?} and cannot be marked paid.",
                status = existing.status
            )))
        }
    }
}
