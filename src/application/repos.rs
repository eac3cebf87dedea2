//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::cache_entry::{CacheEntry, NewCacheEntry};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Backing table for cached upstream responses.
///
/// Every method takes `now` explicitly so expiry is evaluated against a single
/// instant per request.
#[async_trait]
pub trait CacheEntriesRepo: Send + Sync {
    /// Returns the entry for `cache_key` only while `expires_at > now`.
    async fn find_live(
        &self,
        cache_key: &str,
        now: OffsetDateTime,
    ) -> Result<Option<CacheEntry>, RepoError>;

    /// Increments `hit_count` and stamps `last_accessed`.
    async fn record_access(&self, id: Uuid, now: OffsetDateTime) -> Result<(), RepoError>;

    /// Inserts or overwrites the row sharing `cache_key`, resetting `hit_count`.
    async fn upsert(&self, entry: NewCacheEntry) -> Result<CacheEntry, RepoError>;

    /// Physically removes rows with `expires_at <= now`; returns the count removed.
    async fn purge_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError>;

    async fn health_check(&self) -> Result<(), RepoError>;
}
