mod igdb_cache;
mod middleware;

pub use igdb_cache::CacheHttpError;

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::application::{
    error::ErrorReport,
    igdb_cache::{IgdbCacheService, TtlPolicy},
    repos::RepoError,
};

use self::middleware::{cors_headers, log_responses, set_request_context};

/// Public path the hosted function was reachable at.
pub const FUNCTION_PATH: &str = "/functions/v1/igdb-cache";

#[derive(Clone)]
pub struct HttpState {
    pub cache: Arc<IgdbCacheService>,
    pub ttl: TtlPolicy,
}

pub fn build_router(state: HttpState) -> Router {
    let cache_route = post(igdb_cache::serve_cache_request)
        .options(igdb_cache::preflight)
        .fallback(igdb_cache::method_not_allowed);

    Router::new()
        .route("/", cache_route.clone())
        .route(FUNCTION_PATH, cache_route)
        .route("/_health/db", get(db_health))
        .layer(axum_middleware::from_fn(cors_headers))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
        .with_state(state)
}

async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.cache.health_check().await)
}

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
