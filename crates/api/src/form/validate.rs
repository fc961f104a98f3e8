//! Field-level validation for contact submissions.

use std::sync::LazyLock;

use lettre::Address;
use regex::Regex;

use crate::models::ContactSubmission;

/// Basic `local@domain.tld` shape.
///
/// # Panics
///
/// Panics if the hard-coded regex literal is invalid (impossible in practice).
#[allow(clippy::expect_used)]
static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex literal"));

/// Digits, spaces, dashes and parentheses with an optional leading `+`.
///
/// # Panics
///
/// Panics if the hard-coded regex literal is invalid (impossible in practice).
#[allow(clippy::expect_used)]
static PHONE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+]?[\d\s\-()]{8,}$").expect("valid regex literal"));

/// A field check that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    MissingRequired,
    InvalidEmail,
    InvalidPhone,
}

/// Run the field checks in order: required fields, email, phone.
pub fn validate_fields(submission: &ContactSubmission) -> Result<(), FieldError> {
    if !has_required_fields(submission) {
        return Err(FieldError::MissingRequired);
    }
    if !is_valid_email(&submission.email) {
        return Err(FieldError::InvalidEmail);
    }
    if let Some(phone) = submission.phone.as_deref()
        && !phone.trim().is_empty()
        && !is_valid_phone(phone)
    {
        return Err(FieldError::InvalidPhone);
    }
    Ok(())
}

/// Name, email and message must all be non-blank.
pub fn has_required_fields(submission: &ContactSubmission) -> bool {
    [&submission.name, &submission.email, &submission.message]
        .iter()
        .all(|field| !field.trim().is_empty())
}

/// Check an email address.
///
/// The address must have the basic shape and also parse as a mailbox
/// address, since it becomes the notification's reply-to.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_SHAPE.is_match(email) && email.parse::<Address>().is_ok()
}

/// Loose phone number check.
pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_SHAPE.is_match(phone)
}
