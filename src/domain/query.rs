//! Recognised upstream request shapes.
//!
//! Inbound bodies are loosely typed; they are resolved into an [`IgdbQuery`]
//! before anything touches the store or the provider.

use std::{fmt, str::FromStr};

use serde_json::Value;

use super::error::DomainError;

/// Largest page the provider returns for a single request.
pub const MAX_RESULT_LIMIT: u32 = 500;
pub const DEFAULT_GAMES_LIMIT: u32 = 20;
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;
pub const DEFAULT_POPULAR_LIMIT: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalEndpoint {
    Games,
    Search,
    Popular,
}

impl LogicalEndpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            LogicalEndpoint::Games => "games",
            LogicalEndpoint::Search => "search",
            LogicalEndpoint::Popular => "popular",
        }
    }

    /// Provider resource the query is posted to. All logical endpoints query games.
    pub fn provider_path(self) -> &'static str {
        "games"
    }
}

impl fmt::Display for LogicalEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalEndpoint {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "games" => Ok(LogicalEndpoint::Games),
            "search" => Ok(LogicalEndpoint::Search),
            "popular" => Ok(LogicalEndpoint::Popular),
            other => Err(DomainError::unsupported_endpoint(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgdbQuery {
    GameById { game_id: u64 },
    GameSearch { search_term: String, limit: u32 },
    RawGames { query: String },
    Search { search_term: String, limit: u32 },
    Popular { limit: u32 },
}

/// Identifying fields of an inbound request, borrowed from the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryParams<'a> {
    pub query: Option<&'a str>,
    pub game_id: Option<u64>,
    pub search_term: Option<&'a str>,
    pub filters: Option<&'a Value>,
}

impl IgdbQuery {
    /// Resolve a logical endpoint name and its parameters into a query shape.
    ///
    /// For `games`, `gameId` wins over `searchTerm`, which wins over `query`.
    pub fn resolve(endpoint: &str, params: QueryParams<'_>) -> Result<Self, DomainError> {
        let endpoint = LogicalEndpoint::from_str(endpoint)?;

        match endpoint {
            LogicalEndpoint::Games => {
                if let Some(game_id) = params.game_id {
                    return Ok(IgdbQuery::GameById { game_id });
                }
                if let Some(search_term) = non_blank(params.search_term) {
                    let limit = filter_limit(params.filters, DEFAULT_GAMES_LIMIT)?;
                    return Ok(IgdbQuery::GameSearch {
                        search_term: search_term.to_string(),
                        limit,
                    });
                }
                if let Some(query) = non_blank(params.query) {
                    return Ok(IgdbQuery::RawGames {
                        query: query.to_string(),
                    });
                }
                Err(DomainError::missing("games", "gameId, searchTerm or query"))
            }
            LogicalEndpoint::Search => {
                let search_term = non_blank(params.search_term)
                    .ok_or_else(|| DomainError::missing("search", "searchTerm"))?;
                let limit = filter_limit(params.filters, DEFAULT_SEARCH_LIMIT)?;
                Ok(IgdbQuery::Search {
                    search_term: search_term.to_string(),
                    limit,
                })
            }
            LogicalEndpoint::Popular => {
                let limit = filter_limit(params.filters, DEFAULT_POPULAR_LIMIT)?;
                Ok(IgdbQuery::Popular { limit })
            }
        }
    }

    pub fn endpoint(&self) -> LogicalEndpoint {
        match self {
            IgdbQuery::GameById { .. }
            | IgdbQuery::GameSearch { .. }
            | IgdbQuery::RawGames { .. } => LogicalEndpoint::Games,
            IgdbQuery::Search { .. } => LogicalEndpoint::Search,
            IgdbQuery::Popular { .. } => LogicalEndpoint::Popular,
        }
    }
}

/// Trimmed, or `None` when nothing but whitespace remains.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn filter_limit(filters: Option<&Value>, default: u32) -> Result<u32, DomainError> {
    let filters = match filters {
        None | Some(Value::Null) => return Ok(default),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(DomainError::invalid("filters", "must be an object")),
    };

    match filters.get("limit") {
        None | Some(Value::Null) => Ok(default),
        Some(value) => {
            let limit = value.as_u64().filter(|limit| *limit > 0).ok_or_else(|| {
                DomainError::invalid("filters.limit", "must be a positive integer")
            })?;
            Ok(limit.min(u64::from(MAX_RESULT_LIMIT)) as u32)
        }
    }
}
