//! Key-value cache abstraction.
//!
//! The trust core keeps all short-lived shared state (nonces, CSRF state
//! tokens, session-registry entries) in an externally-backed key-value
//! cache. The [`KeyValueCache`] trait is the seam; [`MemoryCache`] is the
//! in-process implementation used in tests and single-node deployments.
//!
//! # Single-use semantics
//!
//! One-time redemption is implemented as a load followed by an immediate
//! remove. If the backing store lacks an atomic take operation there is a
//! narrow race window between the two calls; callers that need strict
//! single-use guarantees across processes should back this trait with a
//! store offering atomic compare-and-delete.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::AuthResult;

/// Storage trait for TTL-bounded key-value entries.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Stores a value under a key with the given time-to-live.
    ///
    /// Overwrites any existing entry for the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unavailable.
    async fn save(&self, key: &str, value: &str, ttl: Duration) -> AuthResult<()>;

    /// Loads a value by key.
    ///
    /// Expired entries behave identically to entries that never existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unavailable.
    async fn load(&self, key: &str) -> AuthResult<Option<String>>;

    /// Removes an entry by key. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unavailable.
    async fn remove(&self, key: &str) -> AuthResult<()>;
}

/// In-memory cache with per-entry TTL.
///
/// Entries are expired lazily on `load`; [`MemoryCache::cleanup`] sweeps
/// the whole map for long-running processes.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes all expired entries.
    pub async fn cleanup(&self) {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!("Cleaned up {removed} expired cache entries");
        }
    }

    /// Returns the number of entries, including not-yet-swept expired ones.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueCache for MemoryCache {
    async fn save(&self, key: &str, value: &str, ttl: Duration) -> AuthResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn load(&self, key: &str) -> AuthResult<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).and_then(|entry| {
            if Instant::now() >= entry.expires_at {
                None
            } else {
                Some(entry.value.clone())
            }
        }))
    }

    async fn remove(&self, key: &str) -> AuthResult<()> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_load() {
        let cache = MemoryCache::new();
        cache
            .save("k1", "v1", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.load("k1").await.unwrap(), Some("v1".to_string()));
        assert_eq!(cache.load("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let cache = MemoryCache::new();
        cache
            .save("k1", "old", Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .save("k1", "new", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.load("k1").await.unwrap(), Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_expired_entry_looks_absent() {
        let cache = MemoryCache::new();
        cache
            .save("k1", "v1", Duration::from_secs(0))
            .await
            .unwrap();

        assert_eq!(cache.load("k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove() {
        let cache = MemoryCache::new();
        cache
            .save("k1", "v1", Duration::from_secs(60))
            .await
            .unwrap();
        cache.remove("k1").await.unwrap();

        assert_eq!(cache.load("k1").await.unwrap(), None);

        // Removing a missing key is fine
        cache.remove("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_sweeps_expired() {
        let cache = MemoryCache::new();
        cache
            .save("expired", "v", Duration::from_secs(0))
            .await
            .unwrap();
        cache
            .save("live", "v", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.len().await, 2);
        cache.cleanup().await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.load("live").await.unwrap(), Some("v".to_string()));
    }
}
