use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "igdb_cache_hit_total",
            Unit::Count,
            "Total number of requests served from a live cache entry."
        );
        describe_counter!(
            "igdb_cache_miss_total",
            Unit::Count,
            "Total number of requests that fetched from IGDB, forced refreshes included."
        );
        describe_counter!(
            "igdb_cache_store_failure_total",
            Unit::Count,
            "Total number of swallowed cache store failures, labelled by operation."
        );
        describe_counter!(
            "igdb_cache_upstream_error_total",
            Unit::Count,
            "Total number of failed IGDB fetches, labelled by failure kind."
        );
        describe_histogram!(
            "igdb_cache_upstream_fetch_ms",
            Unit::Milliseconds,
            "IGDB fetch latency in milliseconds."
        );
        describe_counter!(
            "igdb_cache_purged_total",
            Unit::Count,
            "Total number of expired cache rows physically removed."
        );
    });
}
