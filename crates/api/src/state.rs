//! Application state shared across all handlers.

use std::net::IpAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use redis::Client as RedisClient;
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::form::{CsrfSigner, OriginPolicy};
use crate::metrics::Metrics;
use crate::middleware::{RateLimitConfig, RateLimiter};
use crate::services::{
    CaptchaVerifier, ContactService, EmailService, HCaptchaVerifier, Notifier, PgSubmissionStore,
    SubmissionStore,
};

/// External services the contact pipeline talks to.
pub struct Collaborators {
    pub captcha: Arc<dyn CaptchaVerifier>,
    pub store: Arc<dyn SubmissionStore>,
    pub notifier: Arc<dyn Notifier>,
}

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap. Everything inside is
/// read-only after startup.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Origins allowed to use the API.
    origins: OriginPolicy,

    /// Proxies whose forwarding headers name the client.
    trusted_proxies: Vec<IpAddr>,

    /// CSRF token signer.
    signer: CsrfSigner,

    /// Submission pipeline.
    contact: ContactService,

    /// Prometheus metrics.
    metrics: Metrics,

    /// PostgreSQL pool, for health checks.
    db: Option<PgPool>,

    /// Rate limiter (available when REDIS_URL is configured).
    rate_limiter: Option<RateLimiter>,
}

impl AppState {
    /// Create application state with live connections from configuration.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = db::create_pool(config)
            .await
            .context("failed to create database pool")?;

        let captcha = HCaptchaVerifier::new(
            config.hcaptcha_verify_url.clone(),
            config.hcaptcha_secret.clone(),
            config.captcha_timeout,
        )?;

        let email = EmailService::new(
            &config.smtp_host,
            config.smtp_port,
            config.smtp_username.as_deref(),
            config.smtp_password.as_deref(),
            &config.smtp_encryption,
            config.sender_email.clone(),
            config.recipient_email.clone(),
        )
        .context("failed to create email service")?;

        let rate_limiter = match &config.redis_url {
            Some(url) => {
                let redis =
                    RedisClient::open(url.as_str()).context("failed to create Redis client")?;
                info!("Rate limiting enabled");
                Some(RateLimiter::new(redis, RateLimitConfig::default()))
            }
            None => {
                info!("REDIS_URL not set, rate limiting disabled");
                None
            }
        };

        let collaborators = Collaborators {
            captcha: Arc::new(captcha),
            store: Arc::new(PgSubmissionStore::new(db.clone())),
            notifier: Arc::new(email),
        };

        Ok(Self::assemble(
            OriginPolicy::new(&config.allowed_origins),
            config.trusted_proxies.clone(),
            CsrfSigner::new(config.csrf_secret.as_bytes()),
            collaborators,
            Some(db),
            rate_limiter,
        ))
    }

    /// Create state over the given collaborators, with no database pool
    /// and no rate limiting.
    pub fn from_parts(
        origins: OriginPolicy,
        trusted_proxies: Vec<IpAddr>,
        signer: CsrfSigner,
        collaborators: Collaborators,
    ) -> Self {
        Self::assemble(origins, trusted_proxies, signer, collaborators, None, None)
    }

    fn assemble(
        origins: OriginPolicy,
        trusted_proxies: Vec<IpAddr>,
        signer: CsrfSigner,
        collaborators: Collaborators,
        db: Option<PgPool>,
        rate_limiter: Option<RateLimiter>,
    ) -> Self {
        let contact = ContactService::new(
            signer.clone(),
            collaborators.captcha,
            collaborators.store,
            collaborators.notifier,
        );

        Self {
            inner: Arc::new(AppStateInner {
                origins,
                trusted_proxies,
                signer,
                contact,
                metrics: Metrics::new(),
                db,
                rate_limiter,
            }),
        }
    }

    /// Get the origin allow-list.
    pub fn origins(&self) -> &OriginPolicy {
        &self.inner.origins
    }

    /// Get the proxies trusted to report the client address.
    pub fn trusted_proxies(&self) -> &[IpAddr] {
        &self.inner.trusted_proxies
    }

    /// Get the CSRF signer.
    pub fn signer(&self) -> &CsrfSigner {
        &self.inner.signer
    }

    /// Get the contact submission service.
    pub fn contact(&self) -> &ContactService {
        &self.inner.contact
    }

    /// Get the metrics registry.
    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    /// Get the rate limiter, if configured.
    pub fn rate_limiter(&self) -> Option<&RateLimiter> {
        self.inner.rate_limiter.as_ref()
    }

    /// PostgreSQL reachability; None when no pool is configured.
    pub async fn postgres_healthy(&self) -> Option<bool> {
        match &self.inner.db {
            Some(pool) => Some(db::check_health(pool).await),
            None => None,
        }
    }

    /// Redis reachability; None when rate limiting is disabled.
    pub async fn redis_healthy(&self) -> Option<bool> {
        match &self.inner.rate_limiter {
            Some(limiter) => Some(limiter.healthy().await),
            None => None,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("origins", &self.inner.origins)
            .field("trusted_proxies", &self.inner.trusted_proxies)
            .field("rate_limiter", &self.inner.rate_limiter)
            .finish_non_exhaustive()
    }
}
