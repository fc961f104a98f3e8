//! Data models.

pub mod submission;

pub use submission::{ContactSubmission, StoredSubmission, SubmissionStatus};
