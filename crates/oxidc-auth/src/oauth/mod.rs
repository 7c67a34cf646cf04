//! OAuth 2.0 client-side grant handling.
//!
//! Currently the refresh-token grant: keeping a session's access token
//! fresh against the provider's token endpoint.

pub mod refresh;

pub use refresh::{ClientAuthMethod, RefreshConfig, TokenRefreshCoordinator};
