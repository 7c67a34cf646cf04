//! Signed token verification.
//!
//! Verifies compact-serialized JWTs (ID tokens, logout tokens) issued by
//! an external identity provider against the provider's published JWKS.
//!
//! # Verification pipeline
//!
//! 1. Split the token into exactly three base64url segments
//! 2. Decode the header and check the algorithm (RS256/RS384/RS512 only)
//! 3. Resolve the provider's JWKS (cache-first)
//! 4. Select the key by `kid` and algorithm
//! 5. Rebuild the RSA public key from the JWK's raw modulus/exponent
//! 6. Verify the PKCS#1 v1.5 signature over `header.payload`
//! 7. Validate `exp`, `nbf`, and the expected issuer/audience

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use serde::Deserialize;
use sha2::{Digest, Sha256, Sha384, Sha512};
use url::Url;

use oxidc_core::{AuthError, AuthResult, ClaimSet};

use super::jwks::{JwkSet, JwksCache, decoding_key};

/// RSA signature algorithms supported by this verifier.
///
/// OIDC ID tokens and logout tokens are overwhelmingly RS256-signed; the
/// two longer variants exist for providers that opt into them. Nothing
/// else (HMAC, ECDSA, `none`) is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JwsAlgorithm {
    /// RSASSA-PKCS1-v1_5 using SHA-256.
    Rs256,
    /// RSASSA-PKCS1-v1_5 using SHA-384.
    Rs384,
    /// RSASSA-PKCS1-v1_5 using SHA-512.
    Rs512,
}

impl JwsAlgorithm {
    /// Parses a JOSE `alg` header value.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "RS256" => Some(Self::Rs256),
            "RS384" => Some(Self::Rs384),
            "RS512" => Some(Self::Rs512),
            _ => None,
        }
    }

    /// Returns the JOSE `alg` name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rs256 => "RS256",
            Self::Rs384 => "RS384",
            Self::Rs512 => "RS512",
        }
    }

    /// Verifies a PKCS#1 v1.5 signature over `message` with this
    /// algorithm's digest.
    #[must_use]
    pub fn verify(&self, key: &RsaPublicKey, message: &[u8], signature: &[u8]) -> bool {
        match self {
            Self::Rs256 => key
                .verify(
                    Pkcs1v15Sign::new::<Sha256>(),
                    &Sha256::digest(message),
                    signature,
                )
                .is_ok(),
            Self::Rs384 => key
                .verify(
                    Pkcs1v15Sign::new::<Sha384>(),
                    &Sha384::digest(message),
                    signature,
                )
                .is_ok(),
            Self::Rs512 => key
                .verify(
                    Pkcs1v15Sign::new::<Sha512>(),
                    &Sha512::digest(message),
                    signature,
                )
                .is_ok(),
        }
    }
}

/// Decoded JOSE header fields this verifier inspects.
#[derive(Debug, Deserialize)]
struct JoseHeader {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

/// Configuration for the token verifier.
#[derive(Debug, Clone)]
pub struct TokenVerifierConfig {
    /// Clock skew tolerance for `exp`/`nbf` validation (default: 60 seconds).
    pub clock_skew_tolerance: Duration,
}

impl Default for TokenVerifierConfig {
    fn default() -> Self {
        Self {
            clock_skew_tolerance: Duration::from_secs(60),
        }
    }
}

impl TokenVerifierConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the clock skew tolerance.
    #[must_use]
    pub fn with_clock_skew_tolerance(mut self, tolerance: Duration) -> Self {
        self.clock_skew_tolerance = tolerance;
        self
    }
}

/// Verifies signed identity and logout tokens against a provider's JWKS.
pub struct TokenVerifier {
    jwks_cache: Arc<JwksCache>,
    config: TokenVerifierConfig,
}

impl TokenVerifier {
    /// Creates a verifier sharing the given JWKS cache.
    #[must_use]
    pub fn new(jwks_cache: Arc<JwksCache>, config: TokenVerifierConfig) -> Self {
        Self { jwks_cache, config }
    }

    /// Verifies a token's signature and standard claims, returning the
    /// decoded claim set.
    ///
    /// # Arguments
    ///
    /// * `token` - The compact-serialized JWT
    /// * `jwks_url` - The provider's JWKS endpoint
    /// * `expected_issuer` - When supplied, `iss` must match exactly
    /// * `expected_audience` - When supplied, must appear in `aud`
    ///
    /// # Errors
    ///
    /// Returns the matching verification error kind; see the module docs
    /// for the pipeline. All of these are expected failure modes for
    /// attacker-supplied tokens.
    pub async fn verify_and_decode(
        &self,
        token: &str,
        jwks_url: &Url,
        expected_issuer: Option<&str>,
        expected_audience: Option<&str>,
    ) -> AuthResult<ClaimSet> {
        let keys = self.jwks_cache.get(jwks_url).await?;
        self.verify_with_key_set(token, &keys, expected_issuer, expected_audience)
    }

    /// Verifies a token against an already-resolved key set.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`TokenVerifier::verify_and_decode`], minus
    /// JWKS fetching.
    pub fn verify_with_key_set(
        &self,
        token: &str,
        keys: &JwkSet,
        expected_issuer: Option<&str>,
        expected_audience: Option<&str>,
    ) -> AuthResult<ClaimSet> {
        let (header_b64, payload_b64, signature_b64) = split_token(token)?;

        let header = decode_header(header_b64)?;
        let algorithm = JwsAlgorithm::from_name(&header.alg)
            .ok_or_else(|| AuthError::unsupported_algorithm(&header.alg))?;

        let jwk = keys
            .select_key(header.kid.as_deref(), algorithm.name())
            .ok_or_else(|| {
                AuthError::key_not_found(match &header.kid {
                    Some(kid) => format!("no RSA key with kid {kid}"),
                    None => format!("no RSA key for {}", algorithm.name()),
                })
            })?;
        let key = decoding_key(jwk)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::malformed_token("signature is not valid base64url"))?;

        // The signed message is the raw header.payload prefix of the token.
        let signing_input = &token[..header_b64.len() + 1 + payload_b64.len()];
        if !algorithm.verify(&key, signing_input.as_bytes(), &signature) {
            tracing::debug!("Token signature rejected (kid {:?})", header.kid);
            return Err(AuthError::SignatureInvalid);
        }

        let claims = decode_payload(payload_b64)?;
        self.validate_claims(&claims, expected_issuer, expected_audience)?;
        Ok(claims)
    }

    /// Decodes a token payload without any verification.
    ///
    /// Used only to extract an issuer for provider lookup before the
    /// provider's JWKS endpoint is known. The output is untrusted; callers
    /// MUST NOT make authorization decisions based on it.
    #[must_use]
    pub fn decode_without_verification(token: &str) -> Option<ClaimSet> {
        let (_, payload_b64, _) = split_token(token).ok()?;
        decode_payload(payload_b64).ok()
    }

    /// Validates temporal and identity claims.
    fn validate_claims(
        &self,
        claims: &ClaimSet,
        expected_issuer: Option<&str>,
        expected_audience: Option<&str>,
    ) -> AuthResult<()> {
        let now = unix_now();
        let skew = self.config.clock_skew_tolerance.as_secs() as i64;

        // Saturating arithmetic: claim timestamps are attacker-supplied
        // and may sit at the i64 extremes.
        if let Some(exp) = claims.expires_at()
            && exp.saturating_add(skew) <= now
        {
            return Err(AuthError::claim_expired(format!(
                "token expired {} seconds ago",
                now.saturating_sub(exp)
            )));
        }

        if let Some(nbf) = claims.not_before()
            && nbf.saturating_sub(skew) > now
        {
            return Err(AuthError::claim_expired("token is not yet valid"));
        }

        if let Some(expected) = expected_issuer {
            let actual = claims.issuer().unwrap_or("");
            if actual != expected {
                return Err(AuthError::issuer_mismatch(expected, actual));
            }
        }

        if let Some(expected) = expected_audience
            && !claims.has_audience(expected)
        {
            return Err(AuthError::audience_mismatch(expected));
        }

        Ok(())
    }
}

/// Splits a compact JWT into its three segments.
fn split_token(token: &str) -> AuthResult<(&str, &str, &str)> {
    let mut segments = token.split('.');
    match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(h), Some(p), Some(s), None) if !h.is_empty() && !p.is_empty() && !s.is_empty() => {
            Ok((h, p, s))
        }
        _ => Err(AuthError::malformed_token(
            "expected exactly 3 dot-separated segments",
        )),
    }
}

/// Decodes and parses the JOSE header segment.
fn decode_header(segment: &str) -> AuthResult<JoseHeader> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::malformed_token("header is not valid base64url"))?;
    serde_json::from_slice(&bytes)
        .map_err(|_| AuthError::malformed_token("header is not a valid JOSE header"))
}

/// Decodes and parses the payload segment into a claim set.
fn decode_payload(segment: &str) -> AuthResult<ClaimSet> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::malformed_token("payload is not valid base64url"))?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|_| AuthError::malformed_token("payload is not valid JSON"))?;
    ClaimSet::from_value(value)
        .ok_or_else(|| AuthError::malformed_token("payload is not a JSON object"))
}

/// Current time as UNIX seconds.
fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}


#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::federation::jwks::JwksCacheConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_verify_and_decode_with_fetched_jwks() {
        use super::tests_support::signed_token_and_jwks;

        let (token, jwks) = signed_token_and_jwks(json!({
            "iss": "https://idp.example.com",
            "sub": "user-42",
            "aud": "my-app",
            "exp": unix_now() + 3600
        }));

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
            .mount(&server)
            .await;

        let cache = Arc::new(JwksCache::new(
            JwksCacheConfig::default().with_allow_http(true),
        ));
        let verifier = TokenVerifier::new(cache, TokenVerifierConfig::default());
        let url = Url::parse(&format!("{}/.well-known/jwks.json", server.uri())).unwrap();

        let claims = verifier
            .verify_and_decode(&token, &url, Some("https://idp.example.com"), Some("my-app"))
            .await
            .unwrap();
        assert_eq!(claims.subject(), Some("user-42"));
    }
}
