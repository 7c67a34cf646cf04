//! # oxidc-core
//!
//! Shared foundation for the oxidc OIDC relying-party trust core.
//!
//! This crate provides:
//! - Decoded claim sets with typed accessors
//! - The trust-core error taxonomy
//! - The key-value cache abstraction backing all short-lived shared state
//! - The per-user session context abstraction
//! - Symmetric encryption for at-rest token storage
//!
//! ## Modules
//!
//! - [`claims`] - Generic claim map for decoded tokens
//! - [`error`] - Error types and categories
//! - [`cache`] - TTL key-value cache trait and in-memory backend
//! - [`session`] - Per-user session context trait and in-memory backend
//! - [`crypto`] - Token cipher trait and AES-256-GCM backend

pub mod cache;
pub mod claims;
pub mod crypto;
pub mod error;
pub mod session;

pub use cache::{KeyValueCache, MemoryCache};
pub use claims::{BACKCHANNEL_LOGOUT_EVENT, ClaimSet};
pub use crypto::{AesGcmCipher, NoopCipher, TokenCipher, generate_key};
pub use error::{AuthError, ErrorCategory};
pub use session::{MemorySession, SessionContext};

/// Type alias for trust-core results.
pub type AuthResult<T> = Result<T, AuthError>;
