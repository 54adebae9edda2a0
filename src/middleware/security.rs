use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::AppError;
use crate::state::AppState;

/// Reject requests whose Host header is not on the trusted list. A list
/// containing `*` (or an empty list) disables the check.
pub async fn enforce_trusted_hosts(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let trusted = &state.config.trusted_hosts;
    if trusted.is_empty() || trusted.iter().any(|host| host.trim() == "*") {
        return next.run(request).await;
    }

    let host = request
        .headers()
        .get(axum::http::header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(':').next().unwrap_or(value).to_string())
        .unwrap_or_default();

    if trusted.iter().any(|candidate| candidate.eq_ignore_ascii_case(&host)) {
        next.run(request).await
    } else {
        tracing::warn!(host = %host, "Rejected request from untrusted host");
        AppError::Forbidden("Untrusted host.".to_string()).into_response()
    }
}
