use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateIncomeInput {
    pub project_id: Uuid,
    #[validate(range(min = 0.01))]
    pub amount: f64,
    pub received_on: NaiveDate,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateExpenseInput {
    pub project_id: Uuid,
    #[validate(range(min = 0.01))]
    pub amount: f64,
    pub spent_on: NaiveDate,
}

/// `?period=YYYY-MM`; omitted means the current period.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeriodQuery {
    pub period: Option<String>,
}
