use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Project, ProjectMember};

use super::map_db_error;

const PROJECT_COLUMNS: &str =
    "id, team_id, owner_user_id, allocated_budget, total_deal_amount, start_date, status";

pub async fn get_project(pool: &PgPool, project_id: Uuid) -> Result<Project, AppError> {
    sqlx::query_as::<_, Project>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
    ))
    .bind(project_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound(format!("Project {project_id} not found.")))
}

/// Projects eligible for the profit-share batch: active or completed.
/// On-hold and cancelled projects keep their historical payroll untouched.
pub async fn list_distributable_projects(pool: &PgPool) -> Result<Vec<Project>, AppError> {
    sqlx::query_as::<_, Project>(&format!(
        "SELECT {PROJECT_COLUMNS}
         FROM projects
         WHERE status IN ('active', 'completed')
         ORDER BY start_date ASC"
    ))
    .fetch_all(pool)
    .await
    .map_err(map_db_error)
}

pub async fn list_roster(pool: &PgPool, project_id: Uuid) -> Result<Vec<ProjectMember>, AppError> {
    sqlx::query_as::<_, ProjectMember>(
        "SELECT project_id, user_id, joined_date, left_date, is_active, share_percent
         FROM project_members
         WHERE project_id = $1
         ORDER BY joined_date ASC",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)
}
