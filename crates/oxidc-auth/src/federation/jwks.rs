//! Provider JWKS fetching, caching, and key selection.
//!
//! When validating ID tokens and logout tokens from an external OIDC
//! provider, we need the provider's public keys to verify signatures.
//! This module provides:
//!
//! - [`Jwk`] / [`JwkSet`] - the subset of the JWK model this verifier uses
//! - [`JwksCache`] - fetches and caches JWKS documents per endpoint
//! - [`decoding_key`] - rebuilds an RSA public key from raw JWK fields
//!
//! # Security Considerations
//!
//! - Only HTTPS URIs are allowed for JWKS endpoints (configurable for testing)
//! - HTTP timeouts prevent hanging on slow endpoints
//! - Response size is limited to prevent DoS attacks
//! - Only `kty=RSA` signing keys are ever usable; `use=enc` keys are skipped

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rsa::RsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;

use oxidc_core::{AuthError, AuthResult};

use super::der::rsa_public_key_to_der;

/// A single JSON Web Key.
///
/// Unknown fields are ignored; only the fields needed for RSA signature
/// verification are modeled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (`RSA`, `EC`, `oct`, ...). Only `RSA` keys are usable here.
    #[serde(default)]
    pub kty: String,

    /// Key identifier matched against the token header `kid`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Intended algorithm for this key (`RS256`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Intended use (`sig` or `enc`).
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub public_key_use: Option<String>,

    /// RSA modulus, base64url without padding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA public exponent, base64url without padding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

impl Jwk {
    /// Returns `true` if this is an RSA key usable for signature checks.
    #[must_use]
    pub fn is_rsa_signing_key(&self) -> bool {
        self.kty == "RSA" && self.public_key_use.as_deref() != Some("enc")
    }
}

/// An ordered set of JSON Web Keys, as published at a JWKS endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JwkSet {
    /// The keys, in publication order.
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Selects the key to verify a token with.
    ///
    /// Only RSA signing keys are considered. When the token header carries
    /// a `kid`, the key id must match exactly. Without a `kid`, the first
    /// RSA key whose `alg` is absent or equal to the token's algorithm is
    /// chosen.
    #[must_use]
    pub fn select_key(&self, kid: Option<&str>, alg: &str) -> Option<&Jwk> {
        let mut candidates = self.keys.iter().filter(|k| k.is_rsa_signing_key());
        match kid {
            Some(kid) => candidates.find(|k| {
                k.kid.as_deref() == Some(kid)
                    && k.alg.as_deref().is_none_or(|a| a == alg)
            }),
            None => candidates.find(|k| k.alg.as_deref().is_none_or(|a| a == alg)),
        }
    }
}

/// Rebuilds an [`RsaPublicKey`] from a JWK's raw modulus and exponent.
///
/// The raw fields are base64url-decoded and wrapped in a
/// `SubjectPublicKeyInfo` DER document (see [`super::der`]), which is then
/// parsed by the `rsa` crate.
///
/// # Errors
///
/// Returns `KeyNotFound` if the JWK is missing material or the material
/// does not form a valid RSA public key.
pub fn decoding_key(jwk: &Jwk) -> AuthResult<RsaPublicKey> {
    let n = jwk
        .n
        .as_deref()
        .ok_or_else(|| AuthError::key_not_found("RSA JWK is missing modulus"))?;
    let e = jwk
        .e
        .as_deref()
        .ok_or_else(|| AuthError::key_not_found("RSA JWK is missing exponent"))?;

    let n_bytes = URL_SAFE_NO_PAD
        .decode(n)
        .map_err(|_| AuthError::key_not_found("JWK modulus is not valid base64url"))?;
    let e_bytes = URL_SAFE_NO_PAD
        .decode(e)
        .map_err(|_| AuthError::key_not_found("JWK exponent is not valid base64url"))?;

    let der = rsa_public_key_to_der(&n_bytes, &e_bytes);
    RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| AuthError::key_not_found(format!("unusable RSA key material: {e}")))
}

/// Configuration for the JWKS cache.
#[derive(Debug, Clone)]
pub struct JwksCacheConfig {
    /// How long a fetched JWKS stays cached (default: 24 hours).
    pub ttl: Duration,

    /// HTTP request timeout (default: 10 seconds).
    pub request_timeout: Duration,

    /// Maximum response size in bytes (default: 1 MB).
    pub max_response_size: usize,

    /// Whether to allow HTTP (non-HTTPS) JWKS URIs.
    /// This should only be enabled for testing.
    pub allow_http: bool,
}

impl Default for JwksCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(86400),          // 24 hours
            request_timeout: Duration::from_secs(10), // 10 seconds
            max_response_size: 1024 * 1024,           // 1 MB
            allow_http: false,
        }
    }
}

impl JwksCacheConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cache TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the maximum response size.
    #[must_use]
    pub fn with_max_response_size(mut self, size: usize) -> Self {
        self.max_response_size = size;
        self
    }

    /// Allows HTTP (non-HTTPS) JWKS URIs.
    ///
    /// # Warning
    ///
    /// This should only be used for testing. In production, JWKS endpoints
    /// should always use HTTPS.
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }
}

/// Cached JWKS entry with its expiry.
struct CachedJwks {
    keys: JwkSet,
    expires_at: Instant,
}

/// In-memory cache for provider JWKS documents, keyed by endpoint URL.
pub struct JwksCache {
    /// HTTP client for fetching JWKS.
    http_client: reqwest::Client,
    /// Cached JWKS by normalized URI.
    cache: Arc<RwLock<HashMap<String, CachedJwks>>>,
    /// Configuration.
    config: JwksCacheConfig,
}

impl JwksCache {
    /// Creates a new JWKS cache with the specified configuration.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should not happen in practice).
    #[must_use]
    pub fn new(config: JwksCacheConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            cache: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Creates a new JWKS cache with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(JwksCacheConfig::default())
    }

    /// Returns the key set for a JWKS endpoint, cache-first.
    ///
    /// On a cache miss or expired entry, fetches a fresh document over
    /// HTTPS and caches it for the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns `JwksUnreachable` if the document cannot be fetched or
    /// parsed, or a configuration error for a non-HTTPS URL.
    pub async fn get(&self, jwks_url: &Url) -> AuthResult<JwkSet> {
        let key = normalize_uri(jwks_url);

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(&key)
                && Instant::now() < cached.expires_at
            {
                tracing::trace!("JWKS cache hit for {jwks_url}");
                return Ok(cached.keys.clone());
            }
        }

        tracing::debug!("JWKS cache miss for {jwks_url}");
        self.refresh(jwks_url).await
    }

    /// Fetches a fresh JWKS from the endpoint and updates the cache.
    ///
    /// # Errors
    ///
    /// Returns `JwksUnreachable` on network, HTTP-status, or parse
    /// failures, and a configuration error for a disallowed URL scheme.
    pub async fn refresh(&self, jwks_url: &Url) -> AuthResult<JwkSet> {
        self.validate_scheme(jwks_url)?;

        tracing::debug!("Fetching JWKS from {jwks_url}");

        let mut response = self
            .http_client
            .get(jwks_url.as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Failed to fetch JWKS from {jwks_url}: {e}");
                AuthError::jwks_unreachable(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(AuthError::jwks_unreachable(format!(
                "JWKS endpoint returned status {}",
                response.status().as_u16()
            )));
        }

        // The cap counts bytes actually read, so chunked responses
        // without a Content-Length header cannot sidestep it.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            tracing::warn!("Failed to read JWKS body from {jwks_url}: {e}");
            AuthError::jwks_unreachable(e.to_string())
        })? {
            if body.len() + chunk.len() > self.config.max_response_size {
                return Err(AuthError::jwks_unreachable(format!(
                    "JWKS response exceeds maximum size of {} bytes",
                    self.config.max_response_size
                )));
            }
            body.extend_from_slice(&chunk);
        }

        let keys: JwkSet = serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!("Failed to parse JWKS from {jwks_url}: {e}");
            AuthError::jwks_unreachable(format!("invalid JWKS document: {e}"))
        })?;

        tracing::debug!("Cached JWKS from {jwks_url} with {} keys", keys.keys.len());

        let mut cache = self.cache.write().await;
        cache.insert(
            normalize_uri(jwks_url),
            CachedJwks {
                keys: keys.clone(),
                expires_at: Instant::now() + self.config.ttl,
            },
        );

        Ok(keys)
    }

    /// Validates that the URI uses an allowed scheme.
    fn validate_scheme(&self, uri: &Url) -> AuthResult<()> {
        let scheme = uri.scheme();

        if scheme == "https" || (scheme == "http" && self.config.allow_http) {
            return Ok(());
        }

        Err(AuthError::configuration(
            "JWKS endpoint must use the https scheme",
        ))
    }

    /// Invalidates a cached JWKS entry, forcing the next `get` to fetch.
    pub async fn invalidate(&self, jwks_url: &Url) {
        let mut cache = self.cache.write().await;
        cache.remove(&normalize_uri(jwks_url));
        tracing::debug!("Invalidated JWKS cache for {jwks_url}");
    }

    /// Clears all expired entries from the cache.
    pub async fn cleanup(&self) {
        let mut cache = self.cache.write().await;
        let now = Instant::now();
        cache.retain(|_, v| v.expires_at > now);
    }

    /// Returns the number of entries in the cache.
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Returns `true` if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }
}

/// Normalizes a URI for use as a cache key.
fn normalize_uri(uri: &Url) -> String {
    uri.as_str().trim_end_matches('/').to_string()
}
