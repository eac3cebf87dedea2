//! Cron job that reaps expired cache rows.
//!
//! Lookups already ignore expired rows; this only reclaims space.

use std::{str::FromStr, sync::Arc};

use apalis::prelude::*;
use apalis_cron::Schedule;

use crate::application::igdb_cache::IgdbCacheService;

/// Marker struct for the cron-triggered purge.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron compatibility.
#[derive(Default, Debug, Clone)]
pub struct PurgeExpiredJob;

impl From<chrono::DateTime<chrono::Utc>> for PurgeExpiredJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

#[derive(Clone)]
pub struct PurgeExpiredContext {
    pub cache: Arc<IgdbCacheService>,
}

pub async fn process_purge_expired_job(
    _job: PurgeExpiredJob,
    ctx: Data<PurgeExpiredContext>,
) -> Result<(), apalis::prelude::Error> {
    match ctx.cache.purge_expired().await {
        Ok(count) if count > 0 => {
            tracing::info!(purged_count = count, "Purged expired cache entries");
        }
        Err(err) => {
            tracing::warn!(error = %err, "Failed to purge expired cache entries");
        }
        _ => {}
    }
    Ok(())
}

/// Hourly at minute 0.
pub const DEFAULT_PURGE_SCHEDULE: &str = "0 0 * * * *";

pub fn parse_purge_schedule(expression: &str) -> Result<Schedule, String> {
    Schedule::from_str(expression).map_err(|err| err.to_string())
}
