//! OIDC back-channel logout handling.
//!
//! The provider terminates a session by POSTing a signed logout token to
//! us, server to server. The token looks like an ID token but must carry
//! the back-channel logout event claim and must not carry a nonce (a
//! replayed ID token would). After verification we resolve the local
//! session registered for the token's `sub`/`sid` pair and revoke the
//! mapping so a replayed logout token finds nothing.

use std::sync::Arc;

use url::Url;

use oxidc_core::{AuthError, AuthResult, BACKCHANNEL_LOGOUT_EVENT, KeyValueCache};

use crate::federation::verifier::TokenVerifier;
use crate::session::SessionRegistry;

/// Verifies logout tokens and revokes the sessions they target.
pub struct BackChannelLogoutHandler<C: KeyValueCache> {
    verifier: Arc<TokenVerifier>,
    registry: Arc<SessionRegistry<C>>,
}

impl<C: KeyValueCache> BackChannelLogoutHandler<C> {
    /// Creates a handler over an existing verifier and session registry.
    #[must_use]
    pub fn new(verifier: Arc<TokenVerifier>, registry: Arc<SessionRegistry<C>>) -> Self {
        Self { verifier, registry }
    }

    /// Processes a logout token and returns the revoked local session id.
    ///
    /// Returns `Ok(None)` when the token is valid but no local session is
    /// registered for its `sub`/`sid` pair; the provider may fan logout out
    /// to every client regardless of where the user actually logged in.
    ///
    /// # Errors
    ///
    /// Returns a verification error for a token that fails signature or
    /// claim checks, lacks the logout event claim, lacks `sub`, or carries
    /// a `nonce` claim.
    pub async fn handle_logout_token(
        &self,
        token: &str,
        jwks_url: &Url,
        expected_issuer: &str,
        expected_audience: &str,
    ) -> AuthResult<Option<String>> {
        let claims = self
            .verifier
            .verify_and_decode(
                token,
                jwks_url,
                Some(expected_issuer),
                Some(expected_audience),
            )
            .await?;

        if !claims.has_event(BACKCHANNEL_LOGOUT_EVENT) {
            return Err(AuthError::malformed_token(
                "logout token missing back-channel logout event",
            ));
        }
        // Per OIDC back-channel logout, a nonce marks an ID token being
        // replayed as a logout token.
        if claims.get("nonce").is_some() {
            return Err(AuthError::malformed_token(
                "logout token must not contain a nonce claim",
            ));
        }
        let Some(sub) = claims.subject() else {
            return Err(AuthError::malformed_token("logout token missing sub claim"));
        };
        let sid = claims.session_id().unwrap_or_default();

        let Some(local_session_id) = self.registry.resolve(sub, sid).await? else {
            tracing::debug!("Logout token targets no registered local session");
            return Ok(None);
        };

        self.registry.revoke(sub, sid).await?;
        tracing::info!("Revoked local session via back-channel logout");
        Ok(Some(local_session_id))
    }
}
