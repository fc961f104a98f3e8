//! Configuration loaded from environment variables.

use std::env;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

/// Default hCaptcha verification endpoint.
pub const DEFAULT_HCAPTCHA_VERIFY_URL: &str = "https://hcaptcha.com/siteverify";

/// Application configuration.
///
/// Read once at startup and never mutated afterwards.
#[derive(Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// Allowed request origins (from comma-separated CORS_ORIGIN).
    pub allowed_origins: Vec<String>,

    /// Secret used to sign CSRF tokens.
    pub csrf_secret: String,

    /// hCaptcha server-side secret.
    pub hcaptcha_secret: String,

    /// hCaptcha verification endpoint.
    pub hcaptcha_verify_url: Url,

    /// Timeout for the CAPTCHA verification call (default: 10s).
    pub captcha_timeout: Duration,

    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 5).
    pub database_max_connections: u32,

    /// Reverse proxies whose X-Forwarded-For / X-Real-IP headers are
    /// believed (from comma-separated TRUSTED_PROXIES; default: none).
    pub trusted_proxies: Vec<IpAddr>,

    /// Redis connection URL. When None, rate limiting is disabled.
    pub redis_url: Option<String>,

    /// SMTP host for notification delivery.
    pub smtp_host: String,

    /// SMTP port (default: 587).
    pub smtp_port: u16,

    /// SMTP username for authentication.
    pub smtp_username: Option<String>,

    /// SMTP password for authentication.
    pub smtp_password: Option<String>,

    /// SMTP encryption mode: "starttls" (default), "tls", or "none".
    pub smtp_encryption: String,

    /// Sender identity for notification emails.
    pub sender_email: String,

    /// Recipient of notification emails.
    pub recipient_email: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let allowed_origins = parse_origin_list(
            &env::var("CORS_ORIGIN").context("CORS_ORIGIN environment variable is required")?,
        );

        let csrf_secret = required_secret("CSRF_SECRET")?;
        let hcaptcha_secret = required_secret("HCAPTCHA_SECRET")?;

        let hcaptcha_verify_url = env::var("HCAPTCHA_VERIFY_URL")
            .unwrap_or_else(|_| DEFAULT_HCAPTCHA_VERIFY_URL.to_string())
            .parse()
            .context("HCAPTCHA_VERIFY_URL must be a valid URL")?;

        let captcha_timeout = env::var("CAPTCHA_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map(Duration::from_secs)
            .context("CAPTCHA_TIMEOUT_SECS must be a valid u64")?;

        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let trusted_proxies = parse_proxy_list(&env::var("TRUSTED_PROXIES").unwrap_or_default())?;

        let redis_url = env::var("REDIS_URL").ok().filter(|v| !v.trim().is_empty());

        let smtp_host = env::var("SMTP_HOST").context("SMTP_HOST environment variable is required")?;

        let smtp_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse()
            .context("SMTP_PORT must be a valid u16")?;

        let smtp_username = env::var("SMTP_USERNAME").ok();
        let smtp_password = env::var("SMTP_PASSWORD").ok();

        let smtp_encryption = env::var("SMTP_ENCRYPTION")
            .unwrap_or_else(|_| "starttls".to_string())
            .to_lowercase();

        let sender_email =
            env::var("SENDER_EMAIL").context("SENDER_EMAIL environment variable is required")?;
        let recipient_email = env::var("RECIPIENT_EMAIL")
            .context("RECIPIENT_EMAIL environment variable is required")?;

        Ok(Self {
            port,
            allowed_origins,
            csrf_secret,
            hcaptcha_secret,
            hcaptcha_verify_url,
            captcha_timeout,
            database_url,
            database_max_connections,
            trusted_proxies,
            redis_url,
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            smtp_encryption,
            sender_email,
            recipient_email,
        })
    }
}

/// Split a comma-separated origin list, dropping blank entries.
pub fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse a comma-separated list of proxy IP addresses.
pub fn parse_proxy_list(raw: &str) -> Result<Vec<IpAddr>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .with_context(|| format!("TRUSTED_PROXIES entry {s:?} is not an IP address"))
        })
        .collect()
}

fn required_secret(name: &str) -> Result<String> {
    let value = env::var(name).with_context(|| format!("{name} environment variable is required"))?;
    if value.is_empty() {
        anyhow::bail!("{name} must not be empty");
    }
    Ok(value)
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("allowed_origins", &self.allowed_origins)
            .field("csrf_secret", &"[redacted]")
            .field("hcaptcha_secret", &"[redacted]")
            .field("hcaptcha_verify_url", &self.hcaptcha_verify_url.as_str())
            .field("captcha_timeout", &self.captcha_timeout)
            .field("database_url", &"[redacted]")
            .field("database_max_connections", &self.database_max_connections)
            .field("trusted_proxies", &self.trusted_proxies)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[redacted]"))
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &self.smtp_password.as_ref().map(|_| "[redacted]"))
            .field("smtp_encryption", &self.smtp_encryption)
            .field("sender_email", &self.sender_email)
            .field("recipient_email", &self.recipient_email)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn origin_list_is_trimmed_and_filtered() {
        let origins = parse_origin_list(" https://connected.example , ,https://www.connected.example");
        assert_eq!(
            origins,
            vec![
                "https://connected.example".to_string(),
                "https://www.connected.example".to_string()
            ]
        );
    }

    #[test]
    fn proxy_list_parses_addresses() {
        let proxies = parse_proxy_list("10.0.0.1, ::1,").unwrap();
        assert_eq!(proxies.len(), 2);
        assert_eq!(proxies[0].to_string(), "10.0.0.1");
        assert!(parse_proxy_list("").unwrap().is_empty());
        assert!(parse_proxy_list("10.0.0.1, proxy.internal").is_err());
    }

    #[test]
    fn empty_origin_list_yields_nothing() {
        assert!(parse_origin_list("").is_empty());
        assert!(parse_origin_list(" , ").is_empty());
    }

    #[test]
    fn default_verify_url_parses() {
        let url: Url = DEFAULT_HCAPTCHA_VERIFY_URL.parse().unwrap();
        assert_eq!(url.host_str(), Some("hcaptcha.com"));
    }
}
