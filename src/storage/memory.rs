//! In-memory storage implementation
//!
//! Fast, non-persistent storage for development and testing. Uses DashMap
//! for lock-free concurrent access; `DashMap::remove` gives the atomic
//! take-once semantic for state records.
//!
//! **WARNING:** data is lost on restart and not shared across processes.
//! Production deployments should use [`super::SqliteStorage`].

use super::*;
use crate::model::{OAuthStateRecord, Provider, StoredToken};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory storage backend
#[derive(Clone)]
pub struct MemoryStorage {
    states: Arc<DashMap<String, OAuthStateRecord>>,
    tokens: Arc<DashMap<Provider, StoredToken>>,
}

impl MemoryStorage {
    /// Create a new in-memory storage
    pub fn new() -> Self {
        Self {
            states: Arc::new(DashMap::new()),
            tokens: Arc::new(DashMap::new()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save_state(&self, record: &OAuthStateRecord) -> Result<()> {
        self.states.insert(record.state.clone(), record.clone());
        Ok(())
    }

    async fn take_state(&self, state: &str) -> Result<Option<OAuthStateRecord>> {
        // DashMap::remove is the atomic consume: concurrent callers race on
        // a single entry removal and exactly one observes the value.
        Ok(self
            .states
            .remove(state)
            .map(|(_, record)| record)
            .filter(|record| !record.is_expired()))
    }

    async fn cleanup_expired_states(&self) -> Result<u64> {
        let now = Utc::now();
        let before = self.states.len() as u64;
        self.states.retain(|_, record| record.expires_at > now);
        Ok(before - self.states.len() as u64)
    }

    async fn save_token(&self, token: &StoredToken) -> Result<()> {
        self.tokens.insert(token.provider, token.clone());
        Ok(())
    }

    async fn get_token(&self, provider: Provider) -> Result<Option<StoredToken>> {
        Ok(self.tokens.get(&provider).map(|t| t.clone()))
    }
}
