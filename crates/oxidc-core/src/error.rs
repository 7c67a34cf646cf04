//! Error types for the relying-party trust core.
//!
//! This module defines all error kinds that can occur while verifying
//! tokens, redeeming single-use credentials, and refreshing sessions.
//!
//! # Propagation policy
//!
//! Input that crosses a network or browser-redirect boundary (tokens,
//! relay-state blobs, nonces) is attacker-controlled. Failures caused by
//! such input are expected conditions: functions return a domain error or
//! an empty result, and the caller produces the user-facing message.
//! Only contract violations (missing configuration) are treated as fatal.

use std::fmt;

/// Errors that can occur during trust-core operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token is not a structurally valid compact JWT.
    #[error("Malformed token: {message}")]
    MalformedToken {
        /// Description of the structural problem.
        message: String,
    },

    /// The token header requests an algorithm this verifier does not support.
    #[error("Unsupported algorithm: {algorithm}")]
    UnsupportedAlgorithm {
        /// The requested `alg` header value.
        algorithm: String,
    },

    /// No usable key in the provider's JWKS matched the token.
    #[error("Key not found: {message}")]
    KeyNotFound {
        /// Description of the lookup that failed.
        message: String,
    },

    /// The token signature did not verify against the selected key.
    #[error("Signature verification failed")]
    SignatureInvalid,

    /// The token's `exp` claim is in the past (or `nbf` in the future).
    #[error("Claim expired: {message}")]
    ClaimExpired {
        /// Which temporal claim failed and why.
        message: String,
    },

    /// The token's `iss` claim does not match the expected issuer.
    #[error("Issuer mismatch: expected {expected}, got {actual}")]
    IssuerMismatch {
        /// The issuer the caller expected.
        expected: String,
        /// The issuer found in the token.
        actual: String,
    },

    /// The expected audience does not appear in the token's `aud` claim.
    #[error("Audience mismatch: {expected} not present in token")]
    AudienceMismatch {
        /// The audience the caller expected.
        expected: String,
    },

    /// The provider's JWKS endpoint could not be fetched or parsed.
    #[error("JWKS unreachable: {message}")]
    JwksUnreachable {
        /// Description of the fetch or parse failure.
        message: String,
    },

    /// A nonce or state token does not match the required hex shape.
    #[error("Invalid nonce format")]
    InvalidNonceFormat,

    /// The nonce was never issued, already redeemed, or expired.
    ///
    /// These cases are indistinguishable by design so that callers cannot
    /// be used as an oracle for which secrets ever existed.
    #[error("Nonce not found")]
    NonceNotFound,

    /// The relay-state blob could not be decoded.
    #[error("Relay state corrupt: {message}")]
    RelayStateCorrupt {
        /// Description of the decode failure.
        message: String,
    },

    /// The provider rejected the refresh-token grant.
    #[error("Refresh token rejected: {message}")]
    RefreshTokenRejected {
        /// Description of the rejection.
        message: String,
    },

    /// An error occurred while storing or retrieving trust-core data.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The trust-core configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `MalformedToken` error.
    #[must_use]
    pub fn malformed_token(message: impl Into<String>) -> Self {
        Self::MalformedToken {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedAlgorithm` error.
    #[must_use]
    pub fn unsupported_algorithm(algorithm: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm {
            algorithm: algorithm.into(),
        }
    }

    /// Creates a new `KeyNotFound` error.
    #[must_use]
    pub fn key_not_found(message: impl Into<String>) -> Self {
        Self::KeyNotFound {
            message: message.into(),
        }
    }

    /// Creates a new `ClaimExpired` error.
    #[must_use]
    pub fn claim_expired(message: impl Into<String>) -> Self {
        Self::ClaimExpired {
            message: message.into(),
        }
    }

    /// Creates a new `IssuerMismatch` error.
    #[must_use]
    pub fn issuer_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::IssuerMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a new `AudienceMismatch` error.
    #[must_use]
    pub fn audience_mismatch(expected: impl Into<String>) -> Self {
        Self::AudienceMismatch {
            expected: expected.into(),
        }
    }

    /// Creates a new `JwksUnreachable` error.
    #[must_use]
    pub fn jwks_unreachable(message: impl Into<String>) -> Self {
        Self::JwksUnreachable {
            message: message.into(),
        }
    }

    /// Creates a new `RelayStateCorrupt` error.
    #[must_use]
    pub fn relay_state_corrupt(message: impl Into<String>) -> Self {
        Self::RelayStateCorrupt {
            message: message.into(),
        }
    }

    /// Creates a new `RefreshTokenRejected` error.
    #[must_use]
    pub fn refresh_token_rejected(message: impl Into<String>) -> Self {
        Self::RefreshTokenRejected {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this error was caused by untrusted input
    /// (a token, nonce, or relay-state blob supplied by the client or IdP).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedToken { .. }
                | Self::UnsupportedAlgorithm { .. }
                | Self::KeyNotFound { .. }
                | Self::SignatureInvalid
                | Self::ClaimExpired { .. }
                | Self::IssuerMismatch { .. }
                | Self::AudienceMismatch { .. }
                | Self::InvalidNonceFormat
                | Self::NonceNotFound
                | Self::RelayStateCorrupt { .. }
        )
    }

    /// Returns `true` if this error originated on our side or the provider's.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::JwksUnreachable { .. }
                | Self::RefreshTokenRejected { .. }
                | Self::Storage { .. }
                | Self::Configuration { .. }
                | Self::Internal { .. }
        )
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedToken { .. }
            | Self::UnsupportedAlgorithm { .. }
            | Self::KeyNotFound { .. }
            | Self::SignatureInvalid
            | Self::ClaimExpired { .. }
            | Self::IssuerMismatch { .. }
            | Self::AudienceMismatch { .. } => ErrorCategory::Verification,
            Self::InvalidNonceFormat | Self::NonceNotFound => ErrorCategory::Credential,
            Self::RelayStateCorrupt { .. } => ErrorCategory::RelayState,
            Self::JwksUnreachable { .. } | Self::RefreshTokenRejected { .. } => {
                ErrorCategory::Provider
            }
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of trust-core errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Token signature/claim verification errors.
    Verification,
    /// Single-use credential (nonce, state token) errors.
    Credential,
    /// Relay-state encoding/decoding errors.
    RelayState,
    /// Errors talking to the identity provider.
    Provider,
    /// Infrastructure/storage errors.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verification => write!(f, "verification"),
            Self::Credential => write!(f, "credential"),
            Self::RelayState => write!(f, "relay_state"),
            Self::Provider => write!(f, "provider"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
