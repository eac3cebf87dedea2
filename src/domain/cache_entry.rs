use serde_json::Value;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// A persisted upstream response.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub id: Uuid,
    pub cache_key: String,
    pub endpoint: String,
    pub query_params: Value,
    pub response_data: Value,
    pub expires_at: OffsetDateTime,
    pub hit_count: i64,
    pub last_accessed: OffsetDateTime,
}

impl CacheEntry {
    /// Entries at or past `expires_at` are treated as absent.
    pub fn is_live_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at > now
    }
}

/// Write model for an upsert. `hit_count` is always reset by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCacheEntry {
    pub cache_key: String,
    pub endpoint: String,
    pub query_params: Value,
    pub response_data: Value,
    pub written_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl NewCacheEntry {
    pub fn new(
        cache_key: impl Into<String>,
        endpoint: impl Into<String>,
        query_params: Value,
        response_data: Value,
        written_at: OffsetDateTime,
        ttl: Duration,
    ) -> Self {
        Self {
            cache_key: cache_key.into(),
            endpoint: endpoint.into(),
            query_params,
            response_data,
            written_at,
            expires_at: written_at + ttl,
        }
    }
}
