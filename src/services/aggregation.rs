use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::PayPeriod;
use crate::repository::ledger;

/// Income and expense totals for one project and period, folded into the
/// profit figure the distribution splits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodFinancials {
    pub total_income: f64,
    pub total_expenses: f64,
    pub profit: f64,
}

impl PeriodFinancials {
    pub fn from_totals(total_income: f64, total_expenses: f64) -> Self {
        Self {
            total_income,
            total_expenses,
            profit: total_income - total_expenses,
        }
    }
}

/// Sum the project's ledger for the period. Read-only: marking income as
/// profit-shared happens in the reconciler, after a successful distribution.
pub async fn aggregate_project_finances(
    pool: &PgPool,
    project_id: Uuid,
    period: &PayPeriod,
) -> Result<PeriodFinancials, AppError> {
    let total_income = ledger::sum_project_income(pool, project_id, period).await?;
    let total_expenses = ledger::sum_project_expenses(pool, project_id, period).await?;
    Ok(PeriodFinancials::from_totals(total_income, total_expenses))
}

#[cfg(test)]
mod tests {
    use super::PeriodFinancials;

    #[test]
    fn profit_is_income_minus_expenses() {
        let fin = PeriodFinancials::from_totals(150_000.0, 42_500.0);
        assert_eq!(fin.profit, 107_500.0);
    }

    #[test]
    fn profit_may_be_zero_or_negative() {
        assert_eq!(PeriodFinancials::from_totals(0.0, 0.0).profit, 0.0);
        assert_eq!(PeriodFinancials::from_totals(100.0, 250.0).profit, -150.0);
    }
}
