//! # oxidc-auth
//!
//! OIDC relying-party trust core.
//!
//! This crate provides the security-critical pieces of an OpenID Connect
//! login integration, independent of any web framework:
//!
//! - Signed token verification against a provider's JWKS
//! - Single-use login nonces and CSRF state tokens
//! - Relay-state encoding and open-redirect validation
//! - A registry mapping provider sessions to local sessions, driving
//!   back-channel logout
//! - Access-token refresh via the refresh-token grant
//!
//! ## Modules
//!
//! - [`federation`] - JWKS handling and token verification
//! - [`state`] - One-time credentials and relay state
//! - [`session`] - Provider-to-local session registry
//! - [`oauth`] - Refresh-token grant handling
//!
//! Shared types (errors, claims, the cache/session/cipher seams) live in
//! the `oxidc-core` crate and are re-exported here for convenience.

pub mod federation;
pub mod oauth;
pub mod session;
pub mod state;

// Federation
pub use federation::{
    BackChannelLogoutHandler, Jwk, JwkSet, JwksCache, JwksCacheConfig, TokenVerifier,
    TokenVerifierConfig,
};

// Login state
pub use state::{
    CustomerLoginPayload, EphemeralCredentialStore, LoginType, RelayState, validate_redirect_url,
};

// Session registry
pub use session::SessionRegistry;

// Token refresh
pub use oauth::{ClientAuthMethod, RefreshConfig, TokenRefreshCoordinator};

// Core re-exports
pub use oxidc_core::{
    AuthError, AuthResult, ClaimSet, ErrorCategory, KeyValueCache, MemoryCache, SessionContext,
    TokenCipher,
};
