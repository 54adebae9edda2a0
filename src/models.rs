use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Organization-level role. Exactly one active user is expected to hold
/// `Founder` for a profit distribution to be fully assigned; zero founders
/// is legal and leaves the founder share deliberately undistributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum UserRole {
    Founder,
    TeamManager,
    TeamMember,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Completed,
    OnHold,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PayrollStatus {
    Pending,
    Processing,
    Paid,
    Cancelled,
}

impl PayrollStatus {
    pub fn is_paid(self) -> bool {
        self == Self::Paid
    }
}

/// A member's configured profit weight. "No configured share" is an
/// explicit variant rather than a null check; the default carries the
/// equal-weight fallback of 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareWeight {
    Default,
    Configured(f64),
}

impl ShareWeight {
    /// Negative configured percentages are rejected in favor of the default.
    pub fn from_percent(percent: Option<f64>) -> Self {
        match percent {
            Some(pct) if pct >= 0.0 => Self::Configured(pct),
            _ => Self::Default,
        }
    }

    pub fn value(self) -> f64 {
        match self {
            Self::Default => 1.0,
            Self::Configured(pct) => pct,
        }
    }

    pub fn configured_percent(self) -> Option<f64> {
        match self {
            Self::Default => None,
            Self::Configured(pct) => Some(pct),
        }
    }
}

/// A monthly pay period identified by its `YYYY-MM` label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayPeriod {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PayPeriod {
    pub fn from_label(label: &str) -> Result<Self, AppError> {
        let (year_raw, month_raw) = label
            .trim()
            .split_once('-')
            .ok_or_else(|| invalid_period(label))?;
        let year: i32 = year_raw.parse().map_err(|_| invalid_period(label))?;
        let month: u32 = month_raw.parse().map_err(|_| invalid_period(label))?;

        let start =
            NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| invalid_period(label))?;
        Ok(Self {
            label: format!("{year:04}-{month:02}"),
            start,
            end: last_day_of_month(start),
        })
    }

    pub fn containing(date: NaiveDate) -> Self {
        let start = NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
            .unwrap_or(date);
        Self {
            label: format!("{:04}-{:02}", date.year(), date.month()),
            start,
            end: last_day_of_month(start),
        }
    }
}

impl std::fmt::Display for PayPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label)
    }
}

fn invalid_period(label: &str) -> AppError {
    AppError::BadRequest(format!(
        "Invalid period '{label}': expected YYYY-MM."
    ))
}

fn last_day_of_month(start: NaiveDate) -> NaiveDate {
    let (next_year, next_month) = if start.month() == 12 {
        (start.year() + 1, 1)
    } else {
        (start.year(), start.month() + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(start)
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AppUser {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub base_salary: f64,
    pub is_active: bool,
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub team_id: Uuid,
    pub owner_user_id: Option<Uuid>,
    pub allocated_budget: f64,
    pub total_deal_amount: f64,
    pub start_date: NaiveDate,
    pub status: ProjectStatus,
}

/// Roster entry tying a user to a project with participation dates and an
/// optional relative share weight.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProjectMember {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub joined_date: NaiveDate,
    pub left_date: Option<NaiveDate>,
    pub is_active: bool,
    pub share_percent: Option<f64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct IncomeRecord {
    pub id: Uuid,
    pub amount: f64,
    pub received_on: NaiveDate,
    pub source_type: String,
    pub source_id: Uuid,
    pub profit_shared: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ExpenseRecord {
    pub id: Uuid,
    pub amount: f64,
    pub spent_on: NaiveDate,
    pub project_id: Uuid,
}

/// Persisted payroll entry, unique on `(user_id, project_id, period)`.
/// Once `status = paid` the monetary fields are frozen against the
/// reconciler and the row survives as history.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PayrollRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub period: String,
    pub base_salary: f64,
    pub profit_share: f64,
    pub bonuses: f64,
    pub deductions: f64,
    pub net_amount: f64,
    pub status: PayrollStatus,
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

/// Net pay derivation shared by the reconciler's create and update paths.
pub fn net_amount(base_salary: f64, profit_share: f64, owner_bonus: f64, bonuses: f64, deductions: f64) -> f64 {
    base_salary + profit_share + owner_bonus + bonuses - deductions
}
