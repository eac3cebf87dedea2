//! Application services and persistence contracts.

pub mod cache_key;
pub mod error;
pub mod igdb_cache;
pub mod in_flight;
pub mod jobs;
pub mod repos;
pub mod upstream;
