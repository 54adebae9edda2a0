use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{AppUser, UserRole};

use super::map_db_error;

const USER_COLUMNS: &str = "id, full_name, email, base_salary, is_active, role";

/// Resolve the single active founder, if any. Zero founders is a legal
/// state handled upstream; more than one active founder is ambiguous and
/// resolved arbitrarily by the oldest account, with a warning.
pub async fn find_active_founder(pool: &PgPool) -> Result<Option<AppUser>, AppError> {
    let founders = sqlx::query_as::<_, AppUser>(&format!(
        "SELECT {USER_COLUMNS}
         FROM app_users
         WHERE role = $1 AND is_active = true
         ORDER BY created_at ASC
         LIMIT 2"
    ))
    .bind(UserRole::Founder)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)?;

    if founders.len() > 1 {
        tracing::warn!(
            chosen = %founders[0].id,
            "Multiple active founders found, using the oldest account"
        );
    }
    Ok(founders.into_iter().next())
}

/// Base salaries for a set of users, used when the reconciler seeds new
/// payroll records. Unknown ids simply have no entry (callers default to 0).
pub async fn base_salaries(
    pool: &PgPool,
    user_ids: &[Uuid],
) -> Result<HashMap<Uuid, f64>, AppError> {
    if user_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query_as::<_, (Uuid, f64)>(
        "SELECT id, base_salary FROM app_users WHERE id = ANY($1)",
    )
    .bind(user_ids)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)?;

    Ok(rows.into_iter().collect())
}
