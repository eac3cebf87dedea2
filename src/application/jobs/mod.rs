mod purge_expired;

pub use purge_expired::{
    DEFAULT_PURGE_SCHEDULE, PurgeExpiredContext, PurgeExpiredJob, parse_purge_schedule,
    process_purge_expired_job,
};
