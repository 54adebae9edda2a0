use axum::http::HeaderMap;
use axum::routing::get;
use axum::Router;

use crate::error::AppError;
use crate::state::AppState;

pub mod health;
pub mod ledger;
pub mod payroll;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(ledger::router())
        .merge(payroll::router())
}

/// Administrative endpoints are gated by a shared key when one is
/// configured. Full user authn/authz lives in front of this service.
pub fn require_internal_key(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = state.config.internal_api_key.as_deref() else {
        return Ok(());
    };
    let provided = headers
        .get("x-internal-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if provided == expected {
        Ok(())
    } else {
        Err(AppError::Unauthorized(
            "Missing or invalid internal API key.".to_string(),
        ))
    }
}
