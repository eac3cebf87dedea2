//! The single cache endpoint.
//!
//! Every failure, whatever its cause, is answered with the uniform
//! `{ error, cached: false }` envelope.

use axum::{
    Json,
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use igdb_cache_types::{CacheRequestBody, CacheResponseBody, ErrorEnvelope};
use thiserror::Error;

use crate::application::{
    error::ErrorReport,
    igdb_cache::{CacheError, CacheOutcome, CacheRequest},
};

use super::HttpState;

const SOURCE: &str = "infra::http::igdb_cache";

#[derive(Debug, Error)]
pub enum CacheHttpError {
    #[error("invalid request body: {0}")]
    MalformedBody(serde_json::Error),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("method {0} is not allowed")]
    MethodNotAllowed(Method),
}

impl CacheHttpError {
    fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::MalformedBody(_) | Self::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CacheHttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, Json(ErrorEnvelope::new(self.to_string()))).into_response();
        ErrorReport::from_error(SOURCE, status, &self).attach(&mut response);
        response
    }
}

impl From<CacheOutcome> for CacheResponseBody {
    fn from(outcome: CacheOutcome) -> Self {
        Self {
            data: outcome.data,
            cached: outcome.cached,
            cache_key: outcome.cache_key.into_string(),
            timestamp: outcome.timestamp,
        }
    }
}

pub(super) async fn serve_cache_request(
    State(state): State<HttpState>,
    body: Bytes,
) -> Result<Json<CacheResponseBody>, CacheHttpError> {
    let body: CacheRequestBody =
        serde_json::from_slice(&body).map_err(CacheHttpError::MalformedBody)?;
    let request = CacheRequest::from_body(&body, &state.ttl).map_err(CacheError::from)?;

    let outcome = state.cache.handle(&request).await?;
    Ok(Json(outcome.into()))
}

pub(super) async fn preflight() -> &'static str {
    "ok"
}

pub(super) async fn method_not_allowed(method: Method) -> CacheHttpError {
    CacheHttpError::MethodNotAllowed(method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::DomainError;

    #[test]
    fn method_rejection_maps_to_405() {
        let err = CacheHttpError::MethodNotAllowed(Method::GET);
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.to_string(), "method GET is not allowed");
    }

    #[test]
    fn cache_failures_map_to_500_with_inner_message() {
        let err = CacheHttpError::from(CacheError::from(DomainError::unsupported_endpoint(
            "nonexistent",
        )));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "unsupported endpoint: nonexistent");
    }

    #[test]
    fn error_response_carries_report_for_logging() {
        let response =
            CacheHttpError::MalformedBody(serde_json::from_str::<()>("{").unwrap_err())
                .into_response();
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.source, SOURCE);
        assert_eq!(report.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
