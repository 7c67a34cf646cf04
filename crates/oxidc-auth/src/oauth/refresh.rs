//! Access-token lifetime management via the refresh-token grant.
//!
//! The coordinator keeps the provider's tokens inside the user session:
//! the access token and its absolute expiry in the clear, the refresh
//! token encrypted at rest. `refresh_if_needed` is designed to sit on the
//! request hot path, so the common case (token still fresh) touches only
//! the session and performs no network I/O.
//!
//! Refresh failure is deliberately soft: the provider may be down or the
//! grant may have been revoked, and either way the caller falls back to
//! re-authentication. The stored tokens are left untouched so a transient
//! outage does not destroy a still-valid grant.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use url::Url;

use oxidc_core::{AuthError, AuthResult, SessionContext, TokenCipher};

/// Session key holding the current access token.
const ACCESS_TOKEN_KEY: &str = "oidc.access_token";
/// Session key holding the encrypted refresh token.
const REFRESH_TOKEN_KEY: &str = "oidc.refresh_token";
/// Session key holding the access token's absolute expiry (UNIX seconds).
const EXPIRES_AT_KEY: &str = "oidc.expires_at";

/// How the client authenticates to the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuthMethod {
    /// `client_secret_basic`: credentials in the Authorization header.
    BasicHeader,
    /// `client_secret_post`: credentials in the form body.
    PostBody,
}

/// Configuration for the token refresh coordinator.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// The provider's token endpoint.
    pub token_endpoint: Url,

    /// OAuth client id.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: String,

    /// How to present the client credentials (default: basic header).
    pub auth_method: ClientAuthMethod,

    /// HTTP request timeout (default: 30 seconds).
    pub request_timeout: Duration,

    /// Refresh when the access token expires within this window
    /// (default: 60 seconds).
    pub refresh_threshold: Duration,
}

impl RefreshConfig {
    /// Creates a configuration with default timeouts for the given
    /// endpoint and client credentials.
    #[must_use]
    pub fn new(
        token_endpoint: Url,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            token_endpoint,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_method: ClientAuthMethod::BasicHeader,
            request_timeout: Duration::from_secs(30),
            refresh_threshold: Duration::from_secs(60),
        }
    }

    /// Sets the client authentication method.
    #[must_use]
    pub fn with_auth_method(mut self, method: ClientAuthMethod) -> Self {
        self.auth_method = method;
        self
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the expiry window that triggers a proactive refresh.
    #[must_use]
    pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = threshold;
        self
    }
}

/// Successful token endpoint response, per RFC 6749 §5.1.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Keeps a session's access token fresh via the refresh-token grant.
pub struct TokenRefreshCoordinator {
    http_client: reqwest::Client,
    cipher: Arc<dyn TokenCipher>,
    config: RefreshConfig,
}

impl TokenRefreshCoordinator {
    /// Creates a coordinator with the given configuration and at-rest
    /// cipher for refresh tokens.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should not happen in practice).
    #[must_use]
    pub fn new(config: RefreshConfig, cipher: Arc<dyn TokenCipher>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            cipher,
            config,
        }
    }

    /// Stores a freshly issued token set in the session.
    ///
    /// The refresh token is encrypted before it touches session storage;
    /// `expires_in` is converted to an absolute UNIX timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or the session backend fails.
    pub async fn store_tokens(
        &self,
        session: &dyn SessionContext,
        access_token: &str,
        refresh_token: &str,
        expires_in: Duration,
    ) -> AuthResult<()> {
        session.set(ACCESS_TOKEN_KEY, access_token).await?;
        session
            .set(REFRESH_TOKEN_KEY, &self.cipher.encrypt(refresh_token)?)
            .await?;
        session
            .set(
                EXPIRES_AT_KEY,
                &(unix_now() + expires_in.as_secs() as i64).to_string(),
            )
            .await?;
        Ok(())
    }

    /// Removes all stored tokens from the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session backend fails.
    pub async fn clear_tokens(&self, session: &dyn SessionContext) -> AuthResult<()> {
        session.unset(ACCESS_TOKEN_KEY).await?;
        session.unset(REFRESH_TOKEN_KEY).await?;
        session.unset(EXPIRES_AT_KEY).await?;
        Ok(())
    }

    /// Returns a usable access token, refreshing it first if it expires
    /// within the configured threshold.
    ///
    /// Returns `Ok(None)` when the session holds no tokens or the refresh
    /// attempt fails; the caller should treat that as "re-authenticate".
    /// When the stored token is still fresh this performs no network I/O.
    ///
    /// # Errors
    ///
    /// Returns an error only for session backend or cipher failures.
    /// Provider-side refresh failures are reported as `Ok(None)`.
    pub async fn refresh_if_needed(
        &self,
        session: &dyn SessionContext,
    ) -> AuthResult<Option<String>> {
        let access_token = session.get(ACCESS_TOKEN_KEY).await?;
        let expires_at = session
            .get(EXPIRES_AT_KEY)
            .await?
            .and_then(|v| v.parse::<i64>().ok());

        if let (Some(token), Some(expires_at)) = (access_token, expires_at)
            && unix_now() + (self.config.refresh_threshold.as_secs() as i64) < expires_at
        {
            return Ok(Some(token));
        }

        self.refresh(session).await
    }

    /// Performs the refresh-token grant and rotates the stored tokens.
    ///
    /// On provider failure (network error, non-success status, unusable
    /// response body) the stored tokens are left untouched and `Ok(None)`
    /// is returned. A session without a refresh token is cleared instead:
    /// there is nothing left to recover with.
    ///
    /// # Errors
    ///
    /// Returns an error only for session backend or cipher failures.
    pub async fn refresh(&self, session: &dyn SessionContext) -> AuthResult<Option<String>> {
        let Some(encrypted) = session.get(REFRESH_TOKEN_KEY).await? else {
            // A stale access token without a refresh token cannot recover;
            // drop it so the session reads as logged out.
            tracing::debug!("No refresh token in session");
            self.clear_tokens(session).await?;
            return Ok(None);
        };
        let refresh_token = self.cipher.decrypt(&encrypted)?;

        let tokens = match self.exchange(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(err @ AuthError::RefreshTokenRejected { .. }) => {
                tracing::warn!("{err}");
                return Ok(None);
            }
            Err(other) => return Err(other),
        };

        // Providers that do not rotate refresh tokens omit the field; the
        // existing grant stays valid in that case.
        let next_refresh_token = tokens.refresh_token.as_deref().unwrap_or(&refresh_token);
        let expires_in = Duration::from_secs(tokens.expires_in.unwrap_or(0));
        self.store_tokens(session, &tokens.access_token, next_refresh_token, expires_in)
            .await?;

        tracing::debug!("Refreshed access token for session");
        Ok(Some(tokens.access_token))
    }

    /// Executes the `grant_type=refresh_token` POST against the token
    /// endpoint.
    ///
    /// # Errors
    ///
    /// Returns `RefreshTokenRejected` for network failures, non-success
    /// statuses, and unusable response bodies.
    async fn exchange(&self, refresh_token: &str) -> AuthResult<TokenResponse> {
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let mut request = self.http_client.post(self.config.token_endpoint.as_str());
        match self.config.auth_method {
            ClientAuthMethod::BasicHeader => {
                request = request.basic_auth(
                    &self.config.client_id,
                    Some(&self.config.client_secret),
                );
            }
            ClientAuthMethod::PostBody => {
                form.push(("client_id", self.config.client_id.as_str()));
                form.push(("client_secret", self.config.client_secret.as_str()));
            }
        }

        let response = request.form(&form).send().await.map_err(|e| {
            AuthError::refresh_token_rejected(format!("token request failed: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(AuthError::refresh_token_rejected(format!(
                "token endpoint returned status {}",
                response.status().as_u16()
            )));
        }

        response.json().await.map_err(|e| {
            AuthError::refresh_token_rejected(format!("unusable response body: {e}"))
        })
    }
}

/// Current time as UNIX seconds.
fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
