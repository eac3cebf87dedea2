use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::query::IgdbQuery;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("IGDB credentials are not configured")]
    MissingCredentials,
    #[error("IGDB API error: {status} {body}")]
    Status { status: u16, body: String },
    #[error("failed to reach IGDB: {0}")]
    Transport(String),
    #[error("IGDB returned an unreadable payload: {0}")]
    Decode(String),
}

impl UpstreamError {
    /// Stable label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::MissingCredentials => "missing_credentials",
            UpstreamError::Status { .. } => "status",
            UpstreamError::Transport(_) => "transport",
            UpstreamError::Decode(_) => "decode",
        }
    }
}

/// Issues a single query against the metadata provider. No retries.
///
/// A successful call with an empty body yields `Value::Null`.
#[async_trait]
pub trait IgdbUpstream: Send + Sync {
    async fn fetch(&self, query: &IgdbQuery) -> Result<Value, UpstreamError>;
}
