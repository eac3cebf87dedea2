//! Cache-or-fetch orchestration for IGDB requests.

use std::{sync::Arc, time::Instant};

use igdb_cache_types::CacheRequestBody;
use metrics::{counter, histogram};
use serde_json::{Map, Value};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use crate::application::{
    cache_key::{CacheKey, normalize_params},
    in_flight::InFlightFetches,
    repos::{CacheEntriesRepo, RepoError},
    upstream::{IgdbUpstream, UpstreamError},
};
use crate::domain::{
    cache_entry::{CacheEntry, NewCacheEntry},
    error::DomainError,
    query::{IgdbQuery, QueryParams, non_blank},
};

const LOG_TARGET: &str = "igdb_cache::cache";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Request(#[from] DomainError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("no data received from IGDB for `{endpoint}`")]
    EmptyUpstreamResponse { endpoint: &'static str },
}

/// Lifetime bounds applied to caller-supplied TTLs.
#[derive(Debug, Clone, Copy)]
pub struct TtlPolicy {
    pub default: Duration,
    pub max: Duration,
}

impl TtlPolicy {
    pub fn resolve(&self, requested_seconds: Option<u64>) -> Duration {
        match requested_seconds {
            Some(seconds) => {
                let seconds = i64::try_from(seconds).unwrap_or(i64::MAX);
                Duration::seconds(seconds).min(self.max)
            }
            None => self.default,
        }
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            default: Duration::seconds(igdb_cache_types::DEFAULT_TTL_SECONDS as i64),
            max: Duration::days(30),
        }
    }
}

/// A validated inbound request.
#[derive(Debug, Clone)]
pub struct CacheRequest {
    pub endpoint: String,
    pub query: IgdbQuery,
    pub cache_key: CacheKey,
    pub query_params: Value,
    pub force_refresh: bool,
    pub ttl: Duration,
}

impl CacheRequest {
    pub fn from_body(body: &CacheRequestBody, ttl: &TtlPolicy) -> Result<Self, DomainError> {
        let query = IgdbQuery::resolve(
            &body.endpoint,
            QueryParams {
                query: body.query.as_deref(),
                game_id: body.game_id,
                search_term: body.search_term.as_deref(),
                filters: body.filters.as_ref(),
            },
        )?;

        let params = key_params(body);

        Ok(Self {
            endpoint: body.endpoint.clone(),
            query,
            cache_key: CacheKey::encode(&body.endpoint, &params),
            query_params: normalize_params(&params),
            force_refresh: body.force_refresh,
            ttl: ttl.resolve(body.ttl),
        })
    }
}

// Absent fields become `null` and are dropped by the key encoder.
fn key_params(body: &CacheRequestBody) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("query".into(), text_param(body.query.as_deref()));
    params.insert("gameId".into(), body.game_id.map_or(Value::Null, Value::from));
    params.insert("searchTerm".into(), text_param(body.search_term.as_deref()));
    params.insert("filters".into(), body.filters.clone().unwrap_or(Value::Null));
    params
}

// Same normalization the query resolver applies, so equal upstream queries share a key.
fn text_param(value: Option<&str>) -> Value {
    non_blank(value).map_or(Value::Null, Value::from)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheOutcome {
    pub data: Value,
    pub cached: bool,
    pub cache_key: CacheKey,
    pub timestamp: OffsetDateTime,
}

/// Result of a best-effort store operation. Only ever logged.
#[must_use]
#[derive(Debug)]
pub enum StoreOutcome {
    Applied,
    Failed(RepoError),
}

impl StoreOutcome {
    pub fn from_result<T>(result: Result<T, RepoError>) -> Self {
        match result {
            Ok(_) => StoreOutcome::Applied,
            Err(err) => StoreOutcome::Failed(err),
        }
    }

    pub fn report(self, op: &'static str, cache_key: &CacheKey) {
        if let StoreOutcome::Failed(err) = self {
            counter!("igdb_cache_store_failure_total", "op" => op).increment(1);
            warn!(
                target: LOG_TARGET,
                op,
                cache_key = %cache_key,
                error = %err,
                "cache store operation failed; continuing"
            );
        }
    }
}

#[derive(Clone)]
pub struct IgdbCacheService {
    entries: Arc<dyn CacheEntriesRepo>,
    upstream: Arc<dyn IgdbUpstream>,
    in_flight: Option<InFlightFetches>,
}

impl IgdbCacheService {
    pub fn new(entries: Arc<dyn CacheEntriesRepo>, upstream: Arc<dyn IgdbUpstream>) -> Self {
        Self {
            entries,
            upstream,
            in_flight: None,
        }
    }

    /// Serialize concurrent misses on the same key through one upstream fetch.
    pub fn with_miss_coalescing(mut self, enabled: bool) -> Self {
        self.in_flight = enabled.then(InFlightFetches::new);
        self
    }

    pub async fn handle(&self, request: &CacheRequest) -> Result<CacheOutcome, CacheError> {
        if !request.force_refresh
            && let Some(entry) = self.lookup(&request.cache_key).await
        {
            return Ok(self.serve_hit(entry, &request.cache_key).await);
        }

        let _permit = match &self.in_flight {
            Some(in_flight) => {
                let permit = in_flight.acquire(request.cache_key.as_str()).await;
                // Another holder may have filled the key while we waited.
                if !request.force_refresh
                    && let Some(entry) = self.lookup(&request.cache_key).await
                {
                    return Ok(self.serve_hit(entry, &request.cache_key).await);
                }
                Some(permit)
            }
            None => None,
        };

        counter!("igdb_cache_miss_total").increment(1);
        debug!(
            target: LOG_TARGET,
            cache_key = %request.cache_key,
            force_refresh = request.force_refresh,
            "fetching from IGDB"
        );

        let data = self.fetch(request).await?;
        let written_at = OffsetDateTime::now_utc();

        let write = self
            .entries
            .upsert(NewCacheEntry::new(
                request.cache_key.as_str(),
                request.endpoint.as_str(),
                request.query_params.clone(),
                data.clone(),
                written_at,
                request.ttl,
            ))
            .await;
        StoreOutcome::from_result(write).report("upsert", &request.cache_key);

        Ok(CacheOutcome {
            data,
            cached: false,
            cache_key: request.cache_key.clone(),
            timestamp: written_at,
        })
    }

    /// Physically remove expired rows.
    pub async fn purge_expired(&self) -> Result<u64, RepoError> {
        let removed = self.entries.purge_expired(OffsetDateTime::now_utc()).await?;
        counter!("igdb_cache_purged_total").increment(removed);
        Ok(removed)
    }

    pub async fn health_check(&self) -> Result<(), RepoError> {
        self.entries.health_check().await
    }

    // A failed lookup is reported and treated as a miss.
    async fn lookup(&self, cache_key: &CacheKey) -> Option<CacheEntry> {
        match self
            .entries
            .find_live(cache_key.as_str(), OffsetDateTime::now_utc())
            .await
        {
            Ok(entry) => entry,
            Err(err) => {
                StoreOutcome::Failed(err).report("lookup", cache_key);
                None
            }
        }
    }

    async fn serve_hit(&self, entry: CacheEntry, cache_key: &CacheKey) -> CacheOutcome {
        counter!("igdb_cache_hit_total").increment(1);
        let access = self
            .entries
            .record_access(entry.id, OffsetDateTime::now_utc())
            .await;
        StoreOutcome::from_result(access).report("record_access", cache_key);

        CacheOutcome {
            data: entry.response_data,
            cached: true,
            cache_key: cache_key.clone(),
            timestamp: entry.last_accessed,
        }
    }

    async fn fetch(&self, request: &CacheRequest) -> Result<Value, CacheError> {
        let started = Instant::now();
        let result = self.upstream.fetch(&request.query).await;
        histogram!("igdb_cache_upstream_fetch_ms").record(started.elapsed().as_secs_f64() * 1000.0);

        let data = result.inspect_err(|err| {
            counter!("igdb_cache_upstream_error_total", "kind" => err.kind()).increment(1);
        })?;

        if data.is_null() {
            counter!("igdb_cache_upstream_error_total", "kind" => "empty").increment(1);
            return Err(CacheError::EmptyUpstreamResponse {
                endpoint: request.query.endpoint().as_str(),
            });
        }

        Ok(data)
    }
}
