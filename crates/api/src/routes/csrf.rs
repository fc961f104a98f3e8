//! CSRF token issuance.
//!
//! GET /api/csrf-token

use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::middleware::{RateCategory, rate_limit_response};
use crate::routes::helpers::client_ip;
use crate::state::AppState;

/// Create the token router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/csrf-token", get(issue_token))
}

async fn issue_token(State(state): State<AppState>, request: Request) -> AppResult<Response> {
    info!("Generating CSRF token");

    if !state.origins().allows_request(request.headers()) {
        warn!(origin = ?request.headers().get("origin"), "CSRF token requested from invalid origin");
        return Err(AppError::Forbidden);
    }

    if let Some(limiter) = state.rate_limiter() {
        let client = client_ip(&request, state.trusted_proxies())
            .unwrap_or_else(|| "unknown".to_string());
        if let Err(retry_after) = limiter.check(RateCategory::Token, &client).await {
            state.metrics().record_rate_limit();
            return Ok(rate_limit_response(retry_after));
        }
    }

    let token = state
        .signer()
        .issue()
        .map_err(|e| AppError::Internal(e.context("error generating CSRF token")))?;

    state.metrics().record_token_issued();
    Ok(Json(token).into_response())
}
