//! Storage backends for trackbeat
//!
//! Persists one-time OAuth state records and the per-provider token record
//! behind a unified trait interface.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use crate::Result;
use crate::model::{OAuthStateRecord, Provider, StoredToken};
use async_trait::async_trait;
use std::sync::Arc;

/// Create a storage backend from a DSN
///
/// `":memory:"` selects the in-process backend; anything else is treated as
/// a SQLite path.
pub async fn create_storage(dsn: &str) -> Result<Arc<dyn Storage>> {
    if dsn == ":memory:" {
        Ok(Arc::new(MemoryStorage::new()))
    } else {
        Ok(Arc::new(SqliteStorage::new(dsn).await?))
    }
}

/// Storage trait for OAuth state and token persistence
#[async_trait]
pub trait Storage: Send + Sync {
    // OAuth state methods
    /// Insert a new authorization state record
    async fn save_state(&self, record: &OAuthStateRecord) -> Result<()>;

    /// Atomically fetch and delete a state record
    ///
    /// At most one concurrent caller for the same `state` value receives a
    /// non-`None` result; this single-use guarantee is the CSRF defense.
    /// Expired records are treated as absent even when still present
    /// physically.
    async fn take_state(&self, state: &str) -> Result<Option<OAuthStateRecord>>;

    /// Delete all expired state records, returning how many were removed
    async fn cleanup_expired_states(&self) -> Result<u64>;

    // Token methods
    /// Upsert the token record for a provider (overwrite semantics)
    async fn save_token(&self, token: &StoredToken) -> Result<()>;

    /// Get the token record for a provider
    async fn get_token(&self, provider: Provider) -> Result<Option<StoredToken>>;
}
