//! Notification email composition and delivery using lettre/SMTP.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::models::StoredSubmission;

/// An outgoing notification about a new submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub html_body: String,
    pub reply_to_name: String,
    pub reply_to_email: String,
}

impl Notification {
    /// Compose the notification for a stored submission.
    pub fn for_submission(record: &StoredSubmission) -> Self {
        let or_na = |value: &str| {
            if value.trim().is_empty() {
                "N/A".to_string()
            } else {
                escape(value)
            }
        };

        let message = record
            .message
            .replace("\r\n", "\n")
            .split('\n')
            .map(escape)
            .collect::<Vec<_>>()
            .join("<br/>");

        let html_body = format!(
            "<h2>New Contact Form Submission</h2>\n\
             <p><strong>Submission ID:</strong> {id}</p>\n\
             <p><strong>Name:</strong> {name}</p>\n\
             <p><strong>Email:</strong> {email}</p>\n\
             <p><strong>Company:</strong> {company}</p>\n\
             <p><strong>Phone:</strong> {phone}</p>\n\
             <p><strong>Message:</strong></p>\n\
             <p>{message}</p>\n\
             <hr/>\n\
             <p><small>Submitted at: {submitted} UTC</small></p>\n",
            id = record.id,
            name = escape(&record.name),
            email = escape(&record.email),
            company = or_na(&record.company),
            phone = or_na(&record.phone),
            submitted = record.submitted_at.format("%Y-%m-%d %H:%M:%S"),
        );

        Self {
            subject: format!("New Contact Form Submission - {}", record.name.trim()),
            html_body,
            reply_to_name: record.name.trim().to_string(),
            reply_to_email: record.email.clone(),
        }
    }
}

fn escape(text: &str) -> String {
    ammonia::clean_text(text)
}

/// Delivers notifications to the site owner.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// SMTP notifier.
pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
    recipient_email: String,
}

impl EmailService {
    /// Create a new email service.
    ///
    /// `encryption` controls the SMTP transport mode:
    /// - `"starttls"` (default): Opportunistic STARTTLS on port 587
    /// - `"tls"`: Implicit TLS (SMTPS) on port 465
    /// - `"none"`: Unencrypted (for local dev only)
    pub fn new(
        smtp_host: &str,
        smtp_port: u16,
        smtp_username: Option<&str>,
        smtp_password: Option<&str>,
        encryption: &str,
        from_email: String,
        recipient_email: String,
    ) -> Result<Self> {
        let mut builder = match encryption {
            "tls" => AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
                .context("failed to create SMTP relay transport")?
                .port(smtp_port),
            "none" => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host).port(smtp_port)
            }
            _ => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_host)
                .context("failed to create SMTP STARTTLS transport")?
                .port(smtp_port),
        };

        if let (Some(user), Some(pass)) = (smtp_username, smtp_password) {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        // Fail at startup rather than on the first submission.
        from_email
            .parse::<Address>()
            .context("invalid sender email address")?;
        recipient_email
            .parse::<Address>()
            .context("invalid recipient email address")?;

        Ok(Self {
            transport: builder.build(),
            from_email,
            recipient_email,
        })
    }

    /// Build the MIME message for a notification.
    pub fn build_message(&self, notification: &Notification) -> Result<Message> {
        let reply_to = Mailbox::new(
            Some(notification.reply_to_name.clone()),
            notification
                .reply_to_email
                .parse()
                .context("invalid reply-to address")?,
        );

        Message::builder()
            .from(
                self.from_email
                    .parse()
                    .context("invalid from email address")?,
            )
            .to(self
                .recipient_email
                .parse()
                .context("invalid recipient email address")?)
            .reply_to(reply_to)
            .subject(notification.subject.as_str())
            .header(ContentType::TEXT_HTML)
            .body(notification.html_body.clone())
            .context("failed to build email message")
    }
}

#[async_trait]
impl Notifier for EmailService {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let email = self.build_message(notification)?;

        self.transport
            .send(email)
            .await
            .context("failed to send email")?;

        Ok(())
    }
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailService")
            .field("from_email", &self.from_email)
            .field("recipient_email", &self.recipient_email)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::{ContactSubmission, StoredSubmission};

    fn record(message: &str) -> StoredSubmission {
        let submission = ContactSubmission {
            name: "Jane Doe".into(),
            email: "jane@example.com".into(),
            message: message.into(),
            ..Default::default()
        };
        let at = chrono::Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        StoredSubmission::from_submission(&submission, at)
    }

    fn service() -> EmailService {
        EmailService::new(
            "localhost",
            25,
            None,
            None,
            "none",
            "website@connected.example".to_string(),
            "hello@connected.example".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn subject_names_submitter() {
        let n = Notification::for_submission(&record("Hi"));
        assert_eq!(n.subject, "New Contact Form Submission - Jane Doe");
        assert_eq!(n.reply_to_email, "jane@example.com");
        assert_eq!(n.reply_to_name, "Jane Doe");
    }

    #[test]
    fn body_lists_fields_and_breaks_lines() {
        let r = record("first\nsecond\r\nthird");
        let n = Notification::for_submission(&r);
        assert!(n.html_body.contains(&r.id.to_string()));
        assert_eq!(n.html_body.matches("<br/>").count(), 2);
        assert!(n.html_body.contains("<strong>Company:</strong> N/A"));
        assert!(n.html_body.contains("<strong>Phone:</strong> N/A"));
        assert!(n.html_body.contains("2025-03-04 05:06:07 UTC"));
    }

    #[test]
    fn body_escapes_user_input() {
        let n = Notification::for_submission(&record("<script>alert(1)</script>"));
        assert!(!n.html_body.contains("<script>"));
        assert!(n.html_body.contains("&lt;script&gt;"));
    }

    #[test]
    fn builds_message_with_reply_to() {
        let n = Notification::for_submission(&record("Hi"));
        let message = service().build_message(&n).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Reply-To:"));
        assert!(raw.contains("jane@example.com"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn rejects_invalid_sender() {
        let result = EmailService::new(
            "localhost",
            25,
            None,
            None,
            "none",
            "not an address".to_string(),
            "hello@connected.example".to_string(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn email_service_supports_tls_modes() {
        for mode in ["starttls", "tls"] {
            let result = EmailService::new(
                "nonexistent.invalid",
                587,
                Some("user"),
                Some("pass"),
                mode,
                "website@connected.example".to_string(),
                "hello@connected.example".to_string(),
            );
            // Construction succeeds; connections are lazy
            assert!(result.is_ok());
        }
    }
}
