//! Stateless signed bearer tokens.
//!
//! Wire format: `base64url(subject:expiry) . base64url(hmac)`, where
//! the MAC is HMAC-SHA256 over the raw `subject:expiry` bytes. The
//! payload is authenticated before the expiry is even parsed, so any
//! single-character mutation of a token fails verification.

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime: one hour from issuance.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// Claims carried by a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// Authenticated subject id.
    pub subject: String,
    /// Expiry as Unix seconds.
    pub expiry: u64,
}

/// Token verification failures.
///
/// All variants are treated identically at the connection handshake
/// (close with the unauthorized code); the distinction exists for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Not two base64url sections, or an unparseable payload.
    #[error("malformed token")]
    Malformed,

    /// Signature did not match the payload.
    #[error("token signature mismatch")]
    BadSignature,

    /// Signature matched but the expiry has passed.
    #[error("token expired at {0}")]
    Expired(u64),
}

/// Signs and verifies bearer tokens with a shared secret.
///
/// Verification is a pure function of token, secret, and clock; the
/// authenticator holds no per-session state and needs no coordination.
#[derive(Clone)]
pub struct TokenAuthenticator {
    secret: Vec<u8>,
}

impl TokenAuthenticator {
    /// Create an authenticator from the shared signing secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self { secret: secret.into() }
    }

    /// Sign a token for `subject` expiring at `expiry` (Unix seconds).
    pub fn sign(&self, subject: &str, expiry: u64) -> String {
        let payload = format!("{subject}:{expiry}");
        let tag = self.mac(payload.as_bytes());
        format!("{}.{}", URL_SAFE_NO_PAD.encode(&payload), URL_SAFE_NO_PAD.encode(tag))
    }

    /// Sign a token expiring [`DEFAULT_TOKEN_TTL`] after `now`.
    pub fn sign_with_default_ttl(&self, subject: &str, now: u64) -> String {
        self.sign(subject, now.saturating_add(DEFAULT_TOKEN_TTL.as_secs()))
    }

    /// Verify a token against the current time (Unix seconds).
    ///
    /// # Errors
    ///
    /// - [`TokenError::Malformed`] when the token does not decode
    /// - [`TokenError::BadSignature`] when the MAC does not match
    /// - [`TokenError::Expired`] when `expiry <= now`
    pub fn verify(&self, token: &str, now: u64) -> Result<TokenClaims, TokenError> {
        let (payload_b64, tag_b64) = token.split_once('.').ok_or(TokenError::Malformed)?;

        let payload =
            URL_SAFE_NO_PAD.decode(payload_b64).map_err(|_| TokenError::Malformed)?;
        let tag = URL_SAFE_NO_PAD.decode(tag_b64).map_err(|_| TokenError::Malformed)?;

        // Constant-time comparison via the Mac trait.
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| TokenError::BadSignature)?;
        mac.update(&payload);
        mac.verify_slice(&tag).map_err(|_| TokenError::BadSignature)?;

        let payload = String::from_utf8(payload).map_err(|_| TokenError::Malformed)?;
        let (subject, expiry) = payload.rsplit_once(':').ok_or(TokenError::Malformed)?;
        let expiry: u64 = expiry.parse().map_err(|_| TokenError::Malformed)?;

        if expiry <= now {
            return Err(TokenError::Expired(expiry));
        }

        Ok(TokenClaims { subject: subject.to_string(), expiry })
    }

    fn mac(&self, payload: &[u8]) -> Vec<u8> {
        // HMAC accepts keys of any length; new_from_slice only fails
        // for block-size misuse that Hmac<Sha256> does not have.
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
            return Vec::new();
        };
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

impl std::fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the secret.
        f.debug_struct("TokenAuthenticator").finish_non_exhaustive()
    }
}
