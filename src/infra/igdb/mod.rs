//! IGDB HTTP client and query-language rendering.

mod client;
pub mod query;

pub use client::{IgdbClient, IgdbCredentials};
