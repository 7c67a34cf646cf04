//! Per-user session context abstraction.
//!
//! Framework session objects are ambient global state in most web stacks.
//! The trust core instead takes an explicit [`SessionContext`] parameter
//! wherever it needs per-user storage, so components can be unit tested
//! without a simulated web session.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::AuthResult;

/// A per-user session exposing named values and a stable identifier.
#[async_trait]
pub trait SessionContext: Send + Sync {
    /// Returns the stable identifier of this session.
    fn id(&self) -> &str;

    /// Returns a named session value, if set.
    ///
    /// # Errors
    ///
    /// Returns an error if the session backend is unavailable.
    async fn get(&self, name: &str) -> AuthResult<Option<String>>;

    /// Sets a named session value.
    ///
    /// # Errors
    ///
    /// Returns an error if the session backend is unavailable.
    async fn set(&self, name: &str, value: &str) -> AuthResult<()>;

    /// Removes a named session value. Removing a missing name is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the session backend is unavailable.
    async fn unset(&self, name: &str) -> AuthResult<()>;
}

/// In-memory session implementation for tests and embedding.
pub struct MemorySession {
    id: String,
    values: RwLock<HashMap<String, String>>,
}

impl MemorySession {
    /// Creates an empty session with the given identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionContext for MemorySession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn get(&self, name: &str) -> AuthResult<Option<String>> {
        let values = self.values.read().await;
        Ok(values.get(name).cloned())
    }

    async fn set(&self, name: &str, value: &str) -> AuthResult<()> {
        let mut values = self.values.write().await;
        values.insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn unset(&self, name: &str) -> AuthResult<()> {
        let mut values = self.values.write().await;
        values.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_round_trip() {
        let session = MemorySession::new("sess-1");
        assert_eq!(session.id(), "sess-1");

        session.set("name", "value").await.unwrap();
        assert_eq!(
            session.get("name").await.unwrap(),
            Some("value".to_string())
        );

        session.unset("name").await.unwrap();
        assert_eq!(session.get("name").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unset_missing_name_is_ok() {
        let session = MemorySession::new("sess-2");
        session.unset("never-set").await.unwrap();
    }
}
