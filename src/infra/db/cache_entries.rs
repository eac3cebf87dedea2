use serde_json::Value;
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CacheEntriesRepo, RepoError};
use crate::domain::cache_entry::{CacheEntry, NewCacheEntry};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, sqlx::FromRow)]
struct CacheEntryRow {
    id: Uuid,
    cache_key: String,
    endpoint: String,
    query_params: Json<Value>,
    response_data: Json<Value>,
    expires_at: OffsetDateTime,
    hit_count: i64,
    last_accessed: OffsetDateTime,
}

impl From<CacheEntryRow> for CacheEntry {
    fn from(row: CacheEntryRow) -> Self {
        CacheEntry {
            id: row.id,
            cache_key: row.cache_key,
            endpoint: row.endpoint,
            query_params: row.query_params.0,
            response_data: row.response_data.0,
            expires_at: row.expires_at,
            hit_count: row.hit_count,
            last_accessed: row.last_accessed,
        }
    }
}

#[async_trait::async_trait]
impl CacheEntriesRepo for PostgresRepositories {
    async fn find_live(
        &self,
        cache_key: &str,
        now: OffsetDateTime,
    ) -> Result<Option<CacheEntry>, RepoError> {
        let row = sqlx::query_as::<_, CacheEntryRow>(
            r#"
            SELECT id, cache_key, endpoint, query_params, response_data, expires_at, hit_count, last_accessed
            FROM igdb_cache
            WHERE cache_key = $1 AND expires_at > $2
            "#,
        )
        .bind(cache_key)
        .bind(now)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(CacheEntry::from))
    }

    async fn record_access(&self, id: Uuid, now: OffsetDateTime) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE igdb_cache
            SET hit_count = hit_count + 1, last_accessed = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn upsert(&self, entry: NewCacheEntry) -> Result<CacheEntry, RepoError> {
        // Concurrent writers on one key resolve last-write-wins.
        let row = sqlx::query_as::<_, CacheEntryRow>(
            r#"
            INSERT INTO igdb_cache (id, cache_key, endpoint, query_params, response_data, expires_at, hit_count, last_accessed, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $7)
            ON CONFLICT (cache_key) DO UPDATE SET
                endpoint = EXCLUDED.endpoint,
                query_params = EXCLUDED.query_params,
                response_data = EXCLUDED.response_data,
                expires_at = EXCLUDED.expires_at,
                hit_count = 0,
                last_accessed = EXCLUDED.last_accessed,
                created_at = EXCLUDED.created_at
            RETURNING id, cache_key, endpoint, query_params, response_data, expires_at, hit_count, last_accessed
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&entry.cache_key)
        .bind(&entry.endpoint)
        .bind(Json(&entry.query_params))
        .bind(Json(&entry.response_data))
        .bind(entry.expires_at)
        .bind(entry.written_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM igdb_cache WHERE expires_at <= $1")
            .bind(now)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.ping().await.map_err(map_sqlx_error)
    }
}
