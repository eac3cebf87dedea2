//! Domain types for the IGDB response cache.

pub mod cache_entry;
pub mod error;
pub mod query;
