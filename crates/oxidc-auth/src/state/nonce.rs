//! Single-use login nonces and CSRF state tokens.
//!
//! Three one-time-secret flows share the same semantics (create, then a
//! single redemption): admin login nonces, customer login nonces, and
//! CSRF state tokens bound to a session.
//!
//! # Security Considerations
//!
//! - Secrets are 128-bit CSPRNG values, hex-encoded
//! - Values must match the exact hex shape before any cache lookup is
//!   attempted, so crafted input cannot probe arbitrary cache keys
//! - Redemption is a load followed by an immediate remove; expired entries
//!   are indistinguishable from entries that never existed

use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use oxidc_core::{AuthError, AuthResult, KeyValueCache};

/// Hex length of a 128-bit secret.
const SECRET_LEN: usize = 32;

/// TTL for admin and customer login nonces.
pub const LOGIN_NONCE_TTL: Duration = Duration::from_secs(120);

/// TTL for CSRF state tokens.
pub const STATE_TOKEN_TTL: Duration = Duration::from_secs(600);

/// Payload stored behind a customer login nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerLoginPayload {
    /// The authenticated email the nonce was minted for.
    pub email: String,
    /// The relay-state blob to resume after redemption.
    pub relay_state: String,
}

/// Store for short-lived, single-use secrets gating login transitions.
pub struct EphemeralCredentialStore<C: KeyValueCache> {
    cache: Arc<C>,
    login_nonce_ttl: Duration,
    state_token_ttl: Duration,
}

impl<C: KeyValueCache> EphemeralCredentialStore<C> {
    /// Creates a store with the default TTLs (120s nonces, 600s state tokens).
    #[must_use]
    pub fn new(cache: Arc<C>) -> Self {
        Self {
            cache,
            login_nonce_ttl: LOGIN_NONCE_TTL,
            state_token_ttl: STATE_TOKEN_TTL,
        }
    }

    /// Overrides the login nonce TTL.
    #[must_use]
    pub fn with_login_nonce_ttl(mut self, ttl: Duration) -> Self {
        self.login_nonce_ttl = ttl;
        self
    }

    /// Overrides the state token TTL.
    #[must_use]
    pub fn with_state_token_ttl(mut self, ttl: Duration) -> Self {
        self.state_token_ttl = ttl;
        self
    }

    /// Creates a single-use admin login nonce mapped to an identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing cache is unavailable.
    pub async fn create_admin_login_nonce(&self, email: &str) -> AuthResult<String> {
        let nonce = generate_secret();
        self.cache
            .save(&admin_nonce_key(&nonce), email, self.login_nonce_ttl)
            .await?;
        tracing::debug!("Issued admin login nonce");
        Ok(nonce)
    }

    /// Redeems an admin login nonce, returning the stored identity.
    ///
    /// The nonce is consumed; a second redemption returns `None`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backing cache is unavailable. Unknown,
    /// expired, and malformed nonces all yield `Ok(None)`.
    pub async fn redeem_admin_login_nonce(&self, nonce: &str) -> AuthResult<Option<String>> {
        let key = match admin_nonce_key_checked(nonce) {
            Ok(key) => key,
            Err(err) => return map_redemption_error(err),
        };
        match self.take(&key).await {
            Ok(email) => Ok(Some(email)),
            Err(err) => map_redemption_error(err),
        }
    }

    /// Creates a single-use customer login nonce mapped to an identity and
    /// the relay state to resume after redemption.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized or the backing
    /// cache is unavailable.
    pub async fn create_customer_login_nonce(
        &self,
        email: &str,
        relay_state: &str,
    ) -> AuthResult<String> {
        let payload = CustomerLoginPayload {
            email: email.to_string(),
            relay_state: relay_state.to_string(),
        };
        let serialized = serde_json::to_string(&payload)
            .map_err(|e| AuthError::internal(format!("nonce payload serialization: {e}")))?;

        let nonce = generate_secret();
        self.cache
            .save(&customer_nonce_key(&nonce), &serialized, self.login_nonce_ttl)
            .await?;
        tracing::debug!("Issued customer login nonce");
        Ok(nonce)
    }

    /// Redeems a customer login nonce, returning the stored payload.
    ///
    /// The nonce is consumed; a second redemption returns `None`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backing cache is unavailable.
    pub async fn redeem_customer_login_nonce(
        &self,
        nonce: &str,
    ) -> AuthResult<Option<CustomerLoginPayload>> {
        let key = match customer_nonce_key_checked(nonce) {
            Ok(key) => key,
            Err(err) => return map_redemption_error(err),
        };
        let serialized = match self.take(&key).await {
            Ok(serialized) => serialized,
            Err(err) => return map_redemption_error(err),
        };
        match serde_json::from_str(&serialized) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) => {
                tracing::warn!("Discarding undecodable customer nonce payload: {e}");
                Ok(None)
            }
        }
    }

    /// Creates a CSRF state token bound to a session.
    ///
    /// The cache key hashes the (session binding key, token) pair, so the
    /// token only validates for the session it was minted for.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing cache is unavailable.
    pub async fn create_state_token(&self, session_binding_key: &str) -> AuthResult<String> {
        let token = generate_secret();
        let key = state_token_key(session_binding_key, &token);
        self.cache.save(&key, "1", self.state_token_ttl).await?;
        tracing::debug!("Issued CSRF state token");
        Ok(token)
    }

    /// Validates and consumes a CSRF state token for a session.
    ///
    /// Returns `true` exactly once per issued token; malformed, unknown,
    /// expired, and cross-session tokens return `false`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backing cache is unavailable.
    pub async fn validate_state_token(
        &self,
        session_binding_key: &str,
        token: &str,
    ) -> AuthResult<bool> {
        if !is_valid_secret(token) {
            tracing::debug!("Rejected state token with invalid format");
            return Ok(false);
        }
        let key = state_token_key(session_binding_key, token);
        match self.take(&key).await {
            Ok(_) => Ok(true),
            Err(AuthError::NonceNotFound) => Ok(false),
            Err(other) => Err(other),
        }
    }

    /// Loads a key and immediately removes it. Absent entries (never
    /// issued, already redeemed, or expired) surface as `NonceNotFound`.
    ///
    /// The load and remove are two cache calls; if the backing store lacks
    /// an atomic take, a concurrent redemption in that window can succeed
    /// twice. See the cache module docs for the trade-off.
    async fn take(&self, key: &str) -> AuthResult<String> {
        let Some(value) = self.cache.load(key).await? else {
            return Err(AuthError::NonceNotFound);
        };
        self.cache.remove(key).await?;
        Ok(value)
    }
}

/// Generates a 128-bit CSPRNG secret, hex-encoded.
fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_LEN / 2];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Returns `true` if the value has the exact shape of a generated secret.
fn is_valid_secret(value: &str) -> bool {
    value.len() == SECRET_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn admin_nonce_key(nonce: &str) -> String {
    format!("login-nonce:admin:{nonce}")
}

fn admin_nonce_key_checked(nonce: &str) -> AuthResult<String> {
    if !is_valid_secret(nonce) {
        return Err(AuthError::InvalidNonceFormat);
    }
    Ok(admin_nonce_key(nonce))
}

fn customer_nonce_key(nonce: &str) -> String {
    format!("login-nonce:customer:{nonce}")
}

fn customer_nonce_key_checked(nonce: &str) -> AuthResult<String> {
    if !is_valid_secret(nonce) {
        return Err(AuthError::InvalidNonceFormat);
    }
    Ok(customer_nonce_key(nonce))
}

fn state_token_key(session_binding_key: &str, token: &str) -> String {
    let digest = Sha256::digest(format!("{session_binding_key}|{token}"));
    format!("state-token:{}", hex::encode(digest))
}

/// Converts format violations into the null result the contract promises,
/// keeping the debug trail.
fn map_redemption_error<T>(err: AuthError) -> AuthResult<Option<T>> {
    match err {
        AuthError::InvalidNonceFormat | AuthError::NonceNotFound => {
            tracing::debug!("Nonce redemption refused: {}", err.category());
            Ok(None)
        }
        other => Err(other),
    }
}
