//! Relay-state codec and redirect validation.
//!
//! The OAuth `state` parameter carries everything needed to resume the
//! user's original request after the round trip through the identity
//! provider: the redirect target, the local session id, the application
//! name, the login type, the CSRF state token, and optionally the
//! provider id. The blob is a compact field-keyed JSON map, base64url
//! encoded without padding.
//!
//! Decoding must never panic: the blob crosses a browser-redirect
//! boundary and is fully under client control.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value, json};
use url::Url;

use oxidc_core::{AuthError, AuthResult};

/// Which login surface initiated the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginType {
    /// Storefront customer login.
    Customer,
    /// Admin backend login.
    Admin,
}

impl LoginType {
    /// Short code used inside the relay-state blob.
    #[must_use]
    pub fn as_code(&self) -> &'static str {
        match self {
            Self::Customer => "c",
            Self::Admin => "a",
        }
    }

    /// Parses the short code; unknown codes are rejected.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "c" => Some(Self::Customer),
            "a" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Decoded relay-state record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayState {
    /// URL (or same-origin path) to resume after login.
    pub relay_url: String,
    /// Local session identifier at flow start.
    pub session_id: String,
    /// Application (sales channel) name.
    pub app_name: String,
    /// Which login surface initiated the flow.
    pub login_type: LoginType,
    /// CSRF state token minted for this flow.
    pub state_token: String,
    /// Identity provider id; 0 means unset.
    pub provider_id: u64,
}

impl RelayState {
    /// Creates a relay state with no provider id.
    #[must_use]
    pub fn new(
        relay_url: impl Into<String>,
        session_id: impl Into<String>,
        app_name: impl Into<String>,
        login_type: LoginType,
        state_token: impl Into<String>,
    ) -> Self {
        Self {
            relay_url: relay_url.into(),
            session_id: session_id.into(),
            app_name: app_name.into(),
            login_type,
            state_token: state_token.into(),
            provider_id: 0,
        }
    }

    /// Sets the provider id.
    #[must_use]
    pub fn with_provider_id(mut self, provider_id: u64) -> Self {
        self.provider_id = provider_id;
        self
    }

    /// Encodes this record as an opaque, URL-safe blob.
    ///
    /// `provider_id` is written only when positive, so blobs produced by
    /// older encoders (which had no provider field) and new ones stay
    /// mutually decodable.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut map = Map::new();
        map.insert("u".to_string(), json!(self.relay_url));
        map.insert("s".to_string(), json!(self.session_id));
        map.insert("a".to_string(), json!(self.app_name));
        map.insert("l".to_string(), json!(self.login_type.as_code()));
        map.insert("t".to_string(), json!(self.state_token));
        if self.provider_id > 0 {
            map.insert("p".to_string(), json!(self.provider_id));
        }

        let serialized =
            serde_json::to_string(&Value::Object(map)).expect("string/number map serializes");
        URL_SAFE_NO_PAD.encode(serialized)
    }

    /// Decodes a blob produced by [`RelayState::encode`].
    ///
    /// Returns `None` for anything structurally invalid: bad base64, bad
    /// JSON, missing required keys, wrong value types, or an unknown login
    /// type. A missing `p` key decodes to `provider_id == 0`.
    #[must_use]
    pub fn decode(blob: &str) -> Option<Self> {
        Self::decode_strict(blob).ok()
    }

    /// Decodes a blob, reporting why it is unusable.
    ///
    /// [`RelayState::decode`] is the redirect-boundary entry point and
    /// collapses every failure to `None`; this variant keeps the reason
    /// for structured logs and diagnostics.
    ///
    /// # Errors
    ///
    /// Returns `RelayStateCorrupt` describing the first structural problem
    /// found.
    pub fn decode_strict(blob: &str) -> AuthResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(blob)
            .map_err(|_| AuthError::relay_state_corrupt("blob is not valid base64url"))?;
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|_| AuthError::relay_state_corrupt("blob is not valid JSON"))?;
        let map = value
            .as_object()
            .ok_or_else(|| AuthError::relay_state_corrupt("blob is not a JSON object"))?;

        let required = |key: &str| -> AuthResult<String> {
            map.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    AuthError::relay_state_corrupt(format!("missing or non-string {key} field"))
                })
        };

        Ok(Self {
            relay_url: required("u")?,
            session_id: required("s")?,
            app_name: required("a")?,
            login_type: {
                let code = required("l")?;
                LoginType::from_code(&code).ok_or_else(|| {
                    AuthError::relay_state_corrupt(format!("unknown login type code {code:?}"))
                })?
            },
            state_token: required("t")?,
            provider_id: map.get("p").and_then(Value::as_u64).unwrap_or(0),
        })
    }
}

/// Validates a client-supplied redirect target against open-redirect abuse.
///
/// Accepts same-origin relative paths (a single leading `/`, not `//`) and
/// absolute `http`/`https` URLs whose host matches the application's own
/// base URL host (case-insensitive). Anything else yields `fallback`.
#[must_use]
pub fn validate_redirect_url(candidate: &str, fallback: &str, own_base: &Url) -> String {
    if let Some(rest) = candidate.strip_prefix('/') {
        // "//host" is scheme-relative; browsers also treat a backslash
        // after the slash like "//". Both escape the origin.
        if !rest.starts_with('/') && !rest.starts_with('\\') {
            return candidate.to_string();
        }
        return fallback.to_string();
    }

    match Url::parse(candidate) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            let same_host = match (url.host_str(), own_base.host_str()) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                _ => false,
            };
            if same_host {
                candidate.to_string()
            } else {
                fallback.to_string()
            }
        }
        _ => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RelayState {
        RelayState::new(
            "/account/orders",
            "session-123",
            "Storefront",
            LoginType::Customer,
            "0123456789abcdef0123456789abcdef",
        )
    }

    #[test]
    fn test_round_trip_with_provider_id() {
        let state = sample().with_provider_id(7);
        let decoded = RelayState::decode(&state.encode()).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_round_trip_without_provider_id() {
        let state = sample();
        let blob = state.encode();
        let decoded = RelayState::decode(&blob).unwrap();

        assert_eq!(decoded.provider_id, 0);
        assert_eq!(decoded, state);

        // The optional field is genuinely absent from the wire format
        let raw = URL_SAFE_NO_PAD.decode(&blob).unwrap();
        let value: Value = serde_json::from_slice(&raw).unwrap();
        assert!(value.get("p").is_none());
    }

    #[test]
    fn test_decode_legacy_blob_without_provider_key() {
        // Hand-built blob mimicking an encoder that predates provider ids
        let legacy = URL_SAFE_NO_PAD.encode(
            r#"{"u":"/checkout","s":"sess","a":"Shop","l":"a","t":"0123456789abcdef0123456789abcdef"}"#,
        );
        let decoded = RelayState::decode(&legacy).unwrap();
        assert_eq!(decoded.provider_id, 0);
        assert_eq!(decoded.login_type, LoginType::Admin);
    }

    #[test]
    fn test_blob_is_url_safe() {
        let blob = sample().with_provider_id(42).encode();
        assert!(
            blob.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_decode_rejects_structural_garbage() {
        // Not base64url
        assert!(RelayState::decode("!!!").is_none());
        // Base64 but not JSON
        assert!(RelayState::decode(&URL_SAFE_NO_PAD.encode("not json")).is_none());
        // JSON but not an object
        assert!(RelayState::decode(&URL_SAFE_NO_PAD.encode("[1,2]")).is_none());
        // Missing required key
        assert!(RelayState::decode(&URL_SAFE_NO_PAD.encode(r#"{"u":"/x"}"#)).is_none());
        // Wrong type for a required key
        assert!(
            RelayState::decode(&URL_SAFE_NO_PAD.encode(
                r#"{"u":1,"s":"s","a":"a","l":"c","t":"t"}"#
            ))
            .is_none()
        );
        // Unknown login type code
        assert!(
            RelayState::decode(&URL_SAFE_NO_PAD.encode(
                r#"{"u":"/x","s":"s","a":"a","l":"z","t":"t"}"#
            ))
            .is_none()
        );
    }

    #[test]
    fn test_decode_strict_reports_reason() {
        let err = RelayState::decode_strict("!!!").unwrap_err();
        assert!(matches!(err, AuthError::RelayStateCorrupt { .. }));

        let err = RelayState::decode_strict(&URL_SAFE_NO_PAD.encode(r#"{"u":"/x"}"#))
            .unwrap_err();
        assert!(err.to_string().contains("missing or non-string s field"));

        let err = RelayState::decode_strict(&URL_SAFE_NO_PAD.encode(
            r#"{"u":"/x","s":"s","a":"a","l":"z","t":"t"}"#,
        ))
        .unwrap_err();
        assert!(err.to_string().contains("unknown login type code"));

        // The lenient entry point agrees with the strict one
        let blob = sample().encode();
        assert_eq!(
            RelayState::decode(&blob).unwrap(),
            RelayState::decode_strict(&blob).unwrap()
        );
    }

    #[test]
    fn test_validate_redirect_url_matrix() {
        let base = Url::parse("https://shop.example.com").unwrap();

        assert_eq!(
            validate_redirect_url("/checkout", "/", &base),
            "/checkout"
        );
        assert_eq!(validate_redirect_url("//evil.com/x", "/", &base), "/");
        assert_eq!(
            validate_redirect_url("https://shop.example.com/x", "/", &base),
            "https://shop.example.com/x"
        );
        assert_eq!(
            validate_redirect_url("https://evil.com/x", "/", &base),
            "/"
        );
    }

    #[test]
    fn test_validate_redirect_url_edge_cases() {
        let base = Url::parse("https://shop.example.com").unwrap();

        // Host comparison is case-insensitive
        assert_eq!(
            validate_redirect_url("https://SHOP.example.COM/x", "/", &base),
            "https://SHOP.example.COM/x"
        );
        // Non-web schemes are rejected
        assert_eq!(
            validate_redirect_url("javascript:alert(1)", "/", &base),
            "/"
        );
        assert_eq!(
            validate_redirect_url("ftp://shop.example.com/x", "/", &base),
            "/"
        );
        // Backslash variant of the scheme-relative trick
        assert_eq!(validate_redirect_url("/\\evil.com", "/", &base), "/");
        // Relative without leading slash
        assert_eq!(validate_redirect_url("checkout", "/", &base), "/");
        // Empty input
        assert_eq!(validate_redirect_url("", "/fallback", &base), "/fallback");
        // Bare slash is fine
        assert_eq!(validate_redirect_url("/", "/fallback", &base), "/");
    }
}
