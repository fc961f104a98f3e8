//! Connected API test utilities.
//!
//! Fixtures for contact form payloads and in-memory stand-ins for the
//! CAPTCHA verifier, submission store and notifier.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

use connected_api::Collaborators;
use connected_api::form::CsrfToken;
use connected_api::models::StoredSubmission;
use connected_api::services::{CaptchaVerifier, Notification, Notifier, SubmissionStore};

/// Create a submission payload with valid default fields and no CSRF data.
pub fn test_submission() -> TestSubmission {
    TestSubmission {
        fields: serde_json::json!({
            "name": "Jane Doe",
            "email": "jane@example.com",
            "message": "Need a quote for integration work",
            "hCaptchaToken": "captcha-ok",
            "csrfToken": "",
            "csrfTimestamp": "",
            "csrfSignature": ""
        }),
    }
}

/// A contact form payload builder.
#[derive(Debug, Clone)]
pub struct TestSubmission {
    fields: JsonValue,
}

impl TestSubmission {
    /// Attach an issued CSRF token.
    pub fn with_token(self, token: &CsrfToken) -> Self {
        self.with_field("csrfToken", &token.token)
            .with_field("csrfTimestamp", &token.timestamp)
            .with_field("csrfSignature", &token.signature)
    }

    /// Set a single string field.
    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        if let Some(obj) = self.fields.as_object_mut() {
            obj.insert(name.to_string(), JsonValue::String(value.to_string()));
        }
        self
    }

    /// Remove a field entirely.
    pub fn without(mut self, name: &str) -> Self {
        if let Some(obj) = self.fields.as_object_mut() {
            obj.remove(name);
        }
        self
    }

    /// JSON value of the payload.
    pub fn to_json(&self) -> JsonValue {
        self.fields.clone()
    }

    /// Serialized request body.
    pub fn body(&self) -> String {
        self.fields.to_string()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// CAPTCHA verifier that returns a fixed verdict.
#[derive(Debug, Default)]
pub struct StaticCaptcha {
    pass: bool,
    unreachable: bool,
    calls: AtomicUsize,
    remote_ips: Mutex<Vec<Option<String>>>,
}

impl StaticCaptcha {
    /// Accept every non-empty assertion.
    pub fn passing() -> Self {
        Self {
            pass: true,
            ..Default::default()
        }
    }

    /// Reject every assertion.
    pub fn failing() -> Self {
        Self::default()
    }

    /// Fail every call as if the service timed out.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Default::default()
        }
    }

    /// Number of verification calls made.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Remote addresses forwarded with each call.
    pub fn remote_ips(&self) -> Vec<Option<String>> {
        lock(&self.remote_ips).clone()
    }
}

#[async_trait]
impl CaptchaVerifier for StaticCaptcha {
    async fn verify(&self, response: &str, remote_ip: Option<&str>) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.remote_ips).push(remote_ip.map(str::to_string));
        if self.unreachable {
            anyhow::bail!("verification service timed out");
        }
        Ok(self.pass && !response.is_empty())
    }
}

/// Submission store that keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<StoredSubmission>>,
    fail: bool,
}

impl MemoryStore {
    /// A store whose inserts always fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Records inserted so far.
    pub fn records(&self) -> Vec<StoredSubmission> {
        lock(&self.records).clone()
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn insert(&self, record: &StoredSubmission) -> Result<()> {
        if self.fail {
            anyhow::bail!("table service unavailable");
        }
        lock(&self.records).push(record.clone());
        Ok(())
    }
}

/// Notifier that records messages instead of sending them.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotifier {
    /// A notifier whose sends always fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Notifications sent so far.
    pub fn sent(&self) -> Vec<Notification> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        if self.fail {
            anyhow::bail!("mail relay refused connection");
        }
        lock(&self.sent).push(notification.clone());
        Ok(())
    }
}

/// Handles to the fakes behind a [`Collaborators`] set.
#[derive(Debug, Clone)]
pub struct Fakes {
    pub captcha: Arc<StaticCaptcha>,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Fakes {
    /// Build fakes from the given parts.
    pub fn new(captcha: StaticCaptcha, store: MemoryStore, notifier: RecordingNotifier) -> Self {
        Self {
            captcha: Arc::new(captcha),
            store: Arc::new(store),
            notifier: Arc::new(notifier),
        }
    }

    /// Passing CAPTCHA, working store and notifier.
    pub fn happy() -> Self {
        Self::new(
            StaticCaptcha::passing(),
            MemoryStore::default(),
            RecordingNotifier::default(),
        )
    }

    /// Collaborators for `AppState::from_parts`.
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            captcha: self.captcha.clone(),
            store: self.store.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

/// Assertion helpers for JSON content.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }

    /// Assert that a JSON error body carries the given message.
    pub fn error_is(value: &Value, message: &str) {
        assert_eq!(
            value.get("error").and_then(Value::as_str),
            Some(message),
            "Unexpected error body: {value}"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_and_removes_fields() {
        let payload = test_submission()
            .with_field("phone", "+1 555 0100 200")
            .without("company")
            .without("message")
            .to_json();
        assert_eq!(payload["phone"], "+1 555 0100 200");
        assert!(payload.get("message").is_none());
    }

    #[test]
    fn token_fields_are_copied() {
        let token = CsrfToken {
            token: "t".into(),
            timestamp: "1".into(),
            signature: "s".into(),
        };
        let payload = test_submission().with_token(&token).to_json();
        assert_eq!(payload["csrfToken"], "t");
        assert_eq!(payload["csrfTimestamp"], "1");
        assert_eq!(payload["csrfSignature"], "s");
    }

    #[tokio::test]
    async fn static_captcha_rejects_empty_assertion() {
        let captcha = StaticCaptcha::passing();
        assert!(!captcha.verify("", None).await.unwrap());
        assert!(captcha.verify("ok", Some("192.0.2.1")).await.unwrap());
        assert_eq!(captcha.calls(), 2);
    }
}
