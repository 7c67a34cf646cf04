//! Registry mapping IdP session identity to local sessions.
//!
//! Back-channel logout arrives as a server-to-server request carrying the
//! provider's `sub` and `sid` claims; this registry resolves which local
//! session those identify. Entries are created at login, read during
//! back-channel logout, and deleted on revoke or TTL expiry.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use oxidc_core::{AuthResult, KeyValueCache};

/// Default lifetime of a registry entry.
pub const DEFAULT_REGISTRY_TTL: Duration = Duration::from_secs(86400);

/// Stored registry record.
///
/// Carries the original `sub`/`sid` alongside the local session id so a
/// cache entry can be understood without a second lookup when debugging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// IdP subject identifier.
    pub sub: String,
    /// IdP session identifier; may be empty for subject-only registration.
    pub sid: String,
    /// Local session identifier.
    pub session_id: String,
}

/// Cache-backed map from (sub, sid) to the local session id.
pub struct SessionRegistry<C: KeyValueCache> {
    cache: Arc<C>,
    default_ttl: Duration,
}

impl<C: KeyValueCache> SessionRegistry<C> {
    /// Creates a registry with the default 24-hour entry TTL.
    #[must_use]
    pub fn new(cache: Arc<C>) -> Self {
        Self {
            cache,
            default_ttl: DEFAULT_REGISTRY_TTL,
        }
    }

    /// Overrides the default entry TTL.
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Registers a local session for an IdP subject/session pair.
    ///
    /// A no-op when `sub` or `local_session_id` is empty; writing such
    /// entries would only poison the registry with unresolvable records.
    /// `sid` may be empty for providers that do not issue session ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing cache is unavailable.
    pub async fn register(
        &self,
        sub: &str,
        sid: &str,
        local_session_id: &str,
        ttl: Option<Duration>,
    ) -> AuthResult<()> {
        if sub.is_empty() || local_session_id.is_empty() {
            tracing::debug!("Skipping session registration with empty sub or session id");
            return Ok(());
        }

        let entry = RegistryEntry {
            sub: sub.to_string(),
            sid: sid.to_string(),
            session_id: local_session_id.to_string(),
        };
        let serialized = serde_json::to_string(&entry)
            .map_err(|e| oxidc_core::AuthError::internal(format!("registry entry: {e}")))?;

        self.cache
            .save(
                &cache_key(sub, sid),
                &serialized,
                ttl.unwrap_or(self.default_ttl),
            )
            .await?;
        tracing::debug!("Registered session mapping for subject");
        Ok(())
    }

    /// Resolves the local session registered for a subject/session pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing cache is unavailable.
    pub async fn resolve(&self, sub: &str, sid: &str) -> AuthResult<Option<String>> {
        let Some(serialized) = self.cache.load(&cache_key(sub, sid)).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<RegistryEntry>(&serialized) {
            Ok(entry) => Ok(Some(entry.session_id)),
            Err(e) => {
                tracing::warn!("Discarding undecodable session registry entry: {e}");
                Ok(None)
            }
        }
    }

    /// Removes the registration for a subject/session pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing cache is unavailable.
    pub async fn revoke(&self, sub: &str, sid: &str) -> AuthResult<()> {
        self.cache.remove(&cache_key(sub, sid)).await
    }
}

/// Derives the stable cache key for a subject/session pair.
///
/// SHA-1 here derives a lookup key, nothing more; it is not an integrity
/// mechanism. Swapping the hash would orphan every entry registered by
/// existing deployments, so it stays.
fn cache_key(sub: &str, sid: &str) -> String {
    let digest = Sha1::digest(format!("{sub}|{sid}"));
    format!("oidc-session:{}", hex::encode(digest))
}
