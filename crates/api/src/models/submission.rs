//! Contact form submission payload and the record persisted for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A contact form submission as posted by the browser.
///
/// Absent string fields deserialize as empty so that missing and blank
/// values are rejected by the same checks.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub message: String,
    #[serde(rename = "hCaptchaToken")]
    pub hcaptcha_token: String,
    pub csrf_token: String,
    pub csrf_timestamp: String,
    pub csrf_signature: String,
}

/// Processing status of a stored submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    New,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::New => "New",
        }
    }
}

/// A persisted submission. CAPTCHA and CSRF material is never stored.
#[derive(Debug, Clone, Serialize)]
pub struct StoredSubmission {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub company: String,
    pub phone: String,
    pub message: String,
    pub submitted_at: DateTime<Utc>,
    pub status: SubmissionStatus,
}

impl StoredSubmission {
    /// Build a new record with a fresh id and status `New`.
    pub fn from_submission(submission: &ContactSubmission, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: submission.name.clone(),
            email: submission.email.clone(),
            company: submission.company.clone().unwrap_or_default(),
            phone: submission.phone.clone().unwrap_or_default(),
            message: submission.message.clone(),
            submitted_at,
            status: SubmissionStatus::New,
        }
    }
}
