//! hCaptcha server-side verification.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

/// Redeems a CAPTCHA assertion with the verification service.
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// Returns `Ok(true)` only when the service confirms the assertion.
    ///
    /// Transport failures and non-2xx replies are errors; the caller
    /// decides how to treat them.
    async fn verify(&self, response: &str, remote_ip: Option<&str>) -> Result<bool>;
}

/// Reply from the siteverify endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteVerifyResponse {
    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub challenge_ts: Option<String>,

    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(default, rename = "error-codes")]
    pub error_codes: Vec<String>,
}

/// hCaptcha `siteverify` client.
pub struct HCaptchaVerifier {
    client: reqwest::Client,
    verify_url: Url,
    secret: String,
}

impl HCaptchaVerifier {
    /// Create a verifier for the given endpoint and secret.
    pub fn new(verify_url: Url, secret: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("failed to build CAPTCHA HTTP client")?;

        Ok(Self {
            client,
            verify_url,
            secret,
        })
    }
}

#[async_trait]
impl CaptchaVerifier for HCaptchaVerifier {
    async fn verify(&self, response: &str, remote_ip: Option<&str>) -> Result<bool> {
        if response.is_empty() {
            return Ok(false);
        }

        let form = [
            ("secret", self.secret.as_str()),
            ("response", response),
            ("remoteip", remote_ip.unwrap_or("")),
        ];

        let reply = self
            .client
            .post(self.verify_url.clone())
            .form(&form)
            .send()
            .await
            .context("CAPTCHA verification request failed")?;

        let status = reply.status();
        if !status.is_success() {
            anyhow::bail!("CAPTCHA verification returned HTTP {status}");
        }

        let result: SiteVerifyResponse = reply
            .json()
            .await
            .context("invalid CAPTCHA verification response")?;

        if !result.success {
            debug!(
                error_codes = ?result.error_codes,
                hostname = ?result.hostname,
                "CAPTCHA assertion rejected"
            );
        }

        Ok(result.success)
    }
}

impl std::fmt::Debug for HCaptchaVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HCaptchaVerifier")
            .field("verify_url", &self.verify_url.as_str())
            .finish_non_exhaustive()
    }
}
