//! Decoded token claims.
//!
//! Different identity providers populate different claim sets, so decoded
//! JWT payloads are represented as a generic string-keyed map with typed
//! accessor helpers rather than a fixed schema.

use serde_json::{Map, Value};

/// The event URI carried by back-channel logout tokens.
pub const BACKCHANNEL_LOGOUT_EVENT: &str = "http://schemas.openid.net/event/backchannel-logout";

/// A decoded JWT claim set.
///
/// Wraps the raw JSON object of a token payload and exposes typed
/// accessors for the claims this trust core cares about. Unknown claims
/// are preserved and reachable through the generic accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimSet {
    claims: Map<String, Value>,
}

impl ClaimSet {
    /// Creates a claim set from a decoded JSON value.
    ///
    /// Returns `None` if the value is not a JSON object; a token payload
    /// that decodes to anything else is not a usable claim set.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(claims) => Some(Self { claims }),
            _ => None,
        }
    }

    /// Returns the raw claim value, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// Returns `true` if the claim is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.claims.contains_key(name)
    }

    /// Returns a claim as a string slice, if present and a string.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }

    /// Returns a claim as an integer, if present and numeric.
    #[must_use]
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.claims.get(name).and_then(Value::as_i64)
    }

    /// Returns a claim as an object, if present and an object.
    #[must_use]
    pub fn get_object(&self, name: &str) -> Option<&Map<String, Value>> {
        self.claims.get(name).and_then(Value::as_object)
    }

    /// Returns a claim as a list of strings.
    ///
    /// Accepts both a single string claim and an array-of-strings claim,
    /// which is how `aud` and similar claims appear in the wild.
    #[must_use]
    pub fn get_string_array(&self, name: &str) -> Vec<String> {
        match self.claims.get(name) {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Returns the `iss` claim.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.get_str("iss")
    }

    /// Returns the `sub` claim.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.get_str("sub")
    }

    /// Returns the `sid` (IdP session id) claim.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.get_str("sid")
    }

    /// Returns the `exp` claim as UNIX seconds.
    #[must_use]
    pub fn expires_at(&self) -> Option<i64> {
        self.get_i64("exp")
    }

    /// Returns the `nbf` claim as UNIX seconds.
    #[must_use]
    pub fn not_before(&self) -> Option<i64> {
        self.get_i64("nbf")
    }

    /// Returns the audiences of the token (`aud` as string or array).
    #[must_use]
    pub fn audience(&self) -> Vec<String> {
        self.get_string_array("aud")
    }

    /// Returns `true` if the expected audience appears in `aud`.
    #[must_use]
    pub fn has_audience(&self, expected: &str) -> bool {
        self.audience().iter().any(|a| a == expected)
    }

    /// Returns `true` if the `events` claim contains the given event URI.
    ///
    /// Back-channel logout tokens carry their purpose as a key in the
    /// `events` object claim.
    #[must_use]
    pub fn has_event(&self, event_uri: &str) -> bool {
        self.claims
            .get("events")
            .and_then(Value::as_object)
            .is_some_and(|events| events.contains_key(event_uri))
    }

    /// Returns the number of claims.
    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Returns `true` if there are no claims.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Returns a reference to the underlying claim map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.claims
    }
}

impl From<Map<String, Value>> for ClaimSet {
    fn from(claims: Map<String, Value>) -> Self {
        Self { claims }
    }
}
