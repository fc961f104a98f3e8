//! Contact form submission.
//!
//! POST /api/contact

use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::middleware::{RateCategory, rate_limit_response};
use crate::models::ContactSubmission;
use crate::routes::helpers::client_ip;
use crate::state::AppState;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Acknowledgement returned for an accepted submission.
const THANK_YOU: &str = "Thank you for your message. We'll be in touch soon.";

/// Successful submission response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub submission_id: String,
}

/// Create the contact router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/contact", post(submit))
}

/// Handle a submission.
///
/// The origin is checked before the body is read.
async fn submit(State(state): State<AppState>, request: Request) -> AppResult<Response> {
    info!("Contact form submission received");

    if !state.origins().allows_request(request.headers()) {
        warn!(origin = ?request.headers().get("origin"), "Invalid origin");
        state.metrics().record_submission("forbidden");
        return Err(AppError::Forbidden);
    }

    let remote_ip = client_ip(&request, state.trusted_proxies());

    if let Some(limiter) = state.rate_limiter() {
        let client = remote_ip.as_deref().unwrap_or("unknown");
        if let Err(retry_after) = limiter.check(RateCategory::Contact, client).await {
            state.metrics().record_rate_limit();
            return Ok(rate_limit_response(retry_after));
        }
    }

    let Some(submission) = read_submission(request).await else {
        state.metrics().record_submission("invalid_payload");
        return Err(AppError::BadRequest("Invalid request data".to_string()));
    };

    match state.contact().submit(&submission, remote_ip.as_deref()).await {
        Ok(id) => {
            state.metrics().record_submission("accepted");
            Ok(Json(SubmitResponse {
                success: true,
                message: THANK_YOU.to_string(),
                submission_id: id.to_string(),
            })
            .into_response())
        }
        Err(e) => {
            state.metrics().record_submission(e.outcome());
            Err(e.into())
        }
    }
}

async fn read_submission(request: Request) -> Option<ContactSubmission> {
    let body = axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .inspect_err(|e| warn!(error = %e, "failed to read request body"))
        .ok()?;

    serde_json::from_slice(&body)
        .inspect_err(|e| warn!(error = %e, "malformed submission payload"))
        .ok()
}
