//! Contact pipeline and its external collaborators.

pub mod captcha;
pub mod contact;
pub mod email;
pub mod store;

pub use captcha::{CaptchaVerifier, HCaptchaVerifier};
pub use contact::{ContactService, SubmissionError};
pub use email::{EmailService, Notification, Notifier};
pub use store::{PgSubmissionStore, SubmissionStore};
