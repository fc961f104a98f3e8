//! Contact form submission pipeline.
//!
//! Runs the post-parse checks in a fixed order and stops at the first
//! failure: CSRF signature, token freshness, required fields, email, phone,
//! then the CAPTCHA. Only a submission that passes all of them is stored
//! and announced by email. Nothing is written before the last check passes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::form::csrf::{CsrfError, CsrfSigner};
use crate::form::validate::{FieldError, validate_fields};
use crate::models::{ContactSubmission, StoredSubmission};
use crate::services::captcha::CaptchaVerifier;
use crate::services::email::{Notification, Notifier};
use crate::services::store::SubmissionStore;

/// Why a submission was not accepted.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Invalid security token")]
    InvalidToken,

    #[error("Security token expired")]
    ExpiredToken,

    #[error("Captcha validation failed")]
    CaptchaFailed,

    #[error("All fields are required")]
    MissingFields,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Invalid phone number")]
    InvalidPhone,

    #[error("failed to store submission")]
    Storage(#[source] anyhow::Error),

    #[error("failed to send notification")]
    Notification(#[source] anyhow::Error),
}

impl SubmissionError {
    /// Metric label for this outcome.
    pub fn outcome(&self) -> &'static str {
        match self {
            SubmissionError::InvalidToken => "invalid_token",
            SubmissionError::ExpiredToken => "expired_token",
            SubmissionError::CaptchaFailed => "captcha_failed",
            SubmissionError::MissingFields => "missing_fields",
            SubmissionError::InvalidEmail => "invalid_email",
            SubmissionError::InvalidPhone => "invalid_phone",
            SubmissionError::Storage(_) | SubmissionError::Notification(_) => "internal_error",
        }
    }
}

impl From<CsrfError> for SubmissionError {
    fn from(e: CsrfError) -> Self {
        match e {
            CsrfError::Invalid => SubmissionError::InvalidToken,
            CsrfError::Expired => SubmissionError::ExpiredToken,
        }
    }
}

impl From<FieldError> for SubmissionError {
    fn from(e: FieldError) -> Self {
        match e {
            FieldError::MissingRequired => SubmissionError::MissingFields,
            FieldError::InvalidEmail => SubmissionError::InvalidEmail,
            FieldError::InvalidPhone => SubmissionError::InvalidPhone,
        }
    }
}

impl From<SubmissionError> for AppError {
    fn from(e: SubmissionError) -> Self {
        match e {
            SubmissionError::Storage(source) => {
                AppError::Internal(source.context("failed to store submission"))
            }
            SubmissionError::Notification(source) => {
                AppError::Internal(source.context("failed to send notification"))
            }
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

/// Validates, stores and announces contact form submissions.
pub struct ContactService {
    signer: CsrfSigner,
    captcha: Arc<dyn CaptchaVerifier>,
    store: Arc<dyn SubmissionStore>,
    notifier: Arc<dyn Notifier>,
}

impl ContactService {
    /// Create a new contact service.
    pub fn new(
        signer: CsrfSigner,
        captcha: Arc<dyn CaptchaVerifier>,
        store: Arc<dyn SubmissionStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            signer,
            captcha,
            store,
            notifier,
        }
    }

    /// Process a parsed submission, returning the new submission id.
    pub async fn submit(
        &self,
        submission: &ContactSubmission,
        remote_ip: Option<&str>,
    ) -> Result<Uuid, SubmissionError> {
        self.submit_at(submission, remote_ip, Utc::now()).await
    }

    /// Process a submission as of `now`.
    pub async fn submit_at(
        &self,
        submission: &ContactSubmission,
        remote_ip: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Uuid, SubmissionError> {
        self.signer
            .verify(
                &submission.csrf_token,
                &submission.csrf_timestamp,
                &submission.csrf_signature,
                now.timestamp(),
            )
            .inspect_err(|e| match e {
                CsrfError::Invalid => warn!("invalid CSRF token"),
                CsrfError::Expired => warn!("CSRF token expired or invalid timestamp"),
            })?;

        // Local field checks run before the outbound CAPTCHA call.
        validate_fields(submission).inspect_err(|e| warn!(reason = ?e, "invalid form fields"))?;

        if !self.captcha_passes(&submission.hcaptcha_token, remote_ip).await {
            warn!("hCaptcha validation failed");
            return Err(SubmissionError::CaptchaFailed);
        }

        let record = StoredSubmission::from_submission(submission, now);
        self.store
            .insert(&record)
            .await
            .map_err(SubmissionError::Storage)?;

        let notification = Notification::for_submission(&record);
        self.notifier
            .send(&notification)
            .await
            .map_err(SubmissionError::Notification)?;

        info!(submission_id = %record.id, "contact form submission processed");
        Ok(record.id)
    }

    // Verifier errors count as a failed check; they are not retried.
    async fn captcha_passes(&self, response: &str, remote_ip: Option<&str>) -> bool {
        match self.captcha.verify(response, remote_ip).await {
            Ok(passed) => passed,
            Err(e) => {
                warn!(error = ?e, "CAPTCHA verification unavailable");
                false
            }
        }
    }
}

impl std::fmt::Debug for ContactService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactService").finish_non_exhaustive()
    }
}
