//! Short-lived login state: one-time credentials and relay state.
//!
//! Everything in this module crosses a browser redirect and is therefore
//! attacker-reachable: nonces and state tokens are format-checked before
//! any lookup, and the relay-state codec never panics on hostile input.

pub mod nonce;
pub mod relay;

// One-time secrets
pub use nonce::{
    CustomerLoginPayload, EphemeralCredentialStore, LOGIN_NONCE_TTL, STATE_TOKEN_TTL,
};

// Relay-state codec and redirect validation
pub use relay::{LoginType, RelayState, validate_redirect_url};
