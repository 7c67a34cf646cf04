//! External identity provider federation.
//!
//! This module covers the trust boundary with the OIDC provider:
//!
//! - JWKS fetching, caching, and key selection
//! - RSA public-key reconstruction from raw JWK material
//! - Signed token verification (ID tokens, logout tokens)
//! - Back-channel logout handling

pub mod der;
pub mod jwks;
pub mod logout;
pub mod verifier;

// Key material handling
pub use der::{der_to_pem, rsa_public_key_to_der};
pub use jwks::{Jwk, JwkSet, JwksCache, JwksCacheConfig, decoding_key};

// Token verification
pub use verifier::{JwsAlgorithm, TokenVerifier, TokenVerifierConfig};

// Back-channel logout
pub use logout::BackChannelLogoutHandler;
