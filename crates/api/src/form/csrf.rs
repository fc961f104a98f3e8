//! Stateless double-submit CSRF tokens.
//!
//! A token is a random value plus the Unix timestamp it was issued at,
//! bound together by an HMAC-SHA256 signature under a process-wide secret.
//! Nothing is stored server side: verification recomputes the signature.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Random bytes per token (256 bits).
const TOKEN_BYTES: usize = 32;

/// Token validity period in seconds (30 minutes).
pub const TOKEN_VALIDITY_SECS: i64 = 1800;

/// An issued token, serialized as the issuance response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsrfToken {
    pub token: String,
    pub timestamp: String,
    pub signature: String,
}

/// Why a submitted token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CsrfError {
    #[error("invalid security token")]
    Invalid,

    #[error("security token expired")]
    Expired,
}

/// Compute the signature for `token` issued at `timestamp`.
///
/// Returns base64 of `HMAC-SHA256(secret, "{token}:{timestamp}")`.
pub fn sign(token: &str, timestamp: &str, secret: &[u8]) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).context("invalid CSRF secret")?;
    mac.update(token.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Reject a timestamp from the future or older than the validity window.
pub fn check_freshness(timestamp: &str, now: i64) -> Result<(), CsrfError> {
    let issued: i64 = timestamp.trim().parse().map_err(|_| CsrfError::Expired)?;
    let age = now.checked_sub(issued).ok_or(CsrfError::Expired)?;
    if !(0..=TOKEN_VALIDITY_SECS).contains(&age) {
        return Err(CsrfError::Expired);
    }
    Ok(())
}

/// Issues and verifies tokens with a fixed secret.
#[derive(Clone)]
pub struct CsrfSigner {
    secret: Vec<u8>,
}

impl CsrfSigner {
    /// Create a signer for the given secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Issue a fresh token stamped with the current time.
    pub fn issue(&self) -> Result<CsrfToken> {
        self.issue_at(chrono::Utc::now().timestamp())
    }

    /// Issue a token stamped with `timestamp`.
    pub fn issue_at(&self, timestamp: i64) -> Result<CsrfToken> {
        let mut random_bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng()
            .try_fill_bytes(&mut random_bytes)
            .context("random source unavailable")?;

        let token = STANDARD.encode(random_bytes);
        let timestamp = timestamp.to_string();
        let signature = sign(&token, &timestamp, &self.secret)?;

        Ok(CsrfToken {
            token,
            timestamp,
            signature,
        })
    }

    /// Check that `signature` was produced by this signer for the pair.
    ///
    /// Freshness is a separate check; see [`check_freshness`].
    pub fn verify_signature(
        &self,
        token: &str,
        timestamp: &str,
        signature: &str,
    ) -> Result<(), CsrfError> {
        if token.is_empty() || timestamp.is_empty() || signature.is_empty() {
            return Err(CsrfError::Invalid);
        }

        let expected = sign(token, timestamp, &self.secret).map_err(|_| CsrfError::Invalid)?;
        if expected.as_bytes().ct_eq(signature.as_bytes()).into() {
            Ok(())
        } else {
            Err(CsrfError::Invalid)
        }
    }

    /// Signature check followed by the freshness check against `now`.
    pub fn verify(
        &self,
        token: &str,
        timestamp: &str,
        signature: &str,
        now: i64,
    ) -> Result<(), CsrfError> {
        self.verify_signature(token, timestamp, signature)?;
        check_freshness(timestamp, now)
    }
}

impl std::fmt::Debug for CsrfSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfSigner").finish_non_exhaustive()
    }
}
