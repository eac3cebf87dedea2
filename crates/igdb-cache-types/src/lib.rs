//! Wire types for the igdb-cache HTTP endpoint.
//!
//! Field names follow the camelCase JSON convention the frontend already speaks.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Default time-to-live applied when a request omits `ttl`.
pub const DEFAULT_TTL_SECONDS: u64 = 3600;

/// Inbound request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheRequestBody {
    /// Logical upstream resource (`games`, `search`, `popular`).
    pub endpoint: String,
    /// Raw provider query, passed through verbatim for `games`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
    /// Free-form filter object; `limit` is the only recognised option.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Value>,
    #[serde(default)]
    pub force_refresh: bool,
    /// Entry lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

impl CacheRequestBody {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }
}

/// Success envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheResponseBody {
    pub data: Value,
    pub cached: bool,
    pub cache_key: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Failure envelope. `cached` is always `false`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub error: String,
    pub cached: bool,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            cached: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_uses_camel_case_and_defaults() {
        let body: CacheRequestBody = serde_json::from_value(json!({
            "endpoint": "games",
            "gameId": 1942,
            "searchTerm": "zelda",
        }))
        .expect("valid body");

        assert_eq!(body.endpoint, "games");
        assert_eq!(body.game_id, Some(1942));
        assert_eq!(body.search_term.as_deref(), Some("zelda"));
        assert!(!body.force_refresh);
        assert_eq!(body.ttl, None);
    }

    #[test]
    fn request_body_requires_endpoint() {
        let err = serde_json::from_value::<CacheRequestBody>(json!({ "gameId": 1 }))
            .expect_err("endpoint is mandatory");
        assert!(err.to_string().contains("endpoint"));
    }

    #[test]
    fn response_body_serializes_rfc3339_timestamp() {
        let body = CacheResponseBody {
            data: json!([]),
            cached: true,
            cache_key: "games:e30=".to_string(),
            timestamp: time::macros::datetime!(2024-05-01 12:00:00 UTC),
        };

        let value = serde_json::to_value(&body).expect("serializes");
        assert_eq!(value["cacheKey"], "games:e30=");
        assert_eq!(value["timestamp"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn error_envelope_is_never_cached() {
        let value = serde_json::to_value(ErrorEnvelope::new("boom")).expect("serializes");
        assert_eq!(value, json!({ "error": "boom", "cached": false }));
    }
}
