//! TLE Catalog
//!
//! Process-wide satellite catalog kept warm from Celestrak:
//! - [`CatalogClient`]: rate-limited, retrying HTTP client for the
//!   upstream `gp.php` endpoint
//! - [`TleStore`]: concurrent in-memory catalog with group/name indexes
//!   and a background refresh loop
//! - [`FileCache`]: on-disk fallback (`<group>.tle` + `cache_meta.json`)
//!   consulted when the upstream is unreachable
//! - [`CatalogConfig`]: groups, refresh interval, cache location,
//!   staleness policy

use thiserror::Error;

pub mod cache;
pub mod client;
pub mod config;
pub mod groups;
pub mod store;

pub use cache::{CacheMeta, FileCache, GroupMeta};
pub use client::{CatalogClient, ClientConfig};
pub use config::CatalogConfig;
pub use store::TleStore;

/// Errors surfaced by the catalog client, cache and store.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("no GP data found for {0}")]
    NotFound(String),
    #[error("upstream rate limited the request (HTTP 429)")]
    RateLimited,
    #[error("upstream server error (HTTP {0})")]
    ServerError(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request cancelled or deadline exceeded")]
    Cancelled,
    #[error("upstream response is not parseable TLE data: {0}")]
    Parse(String),
    #[error("unknown catalog group {0:?}")]
    UnknownGroup(String),
    #[error("cache read failed for {path}: {reason}")]
    CacheRead { path: String, reason: String },
    #[error("cache write failed for {path}: {reason}")]
    CacheWrite { path: String, reason: String },
    #[error("cache metadata is corrupt: {0}")]
    MetaParse(String),
    #[error("loading group {group:?} failed; upstream: {upstream}; cache: {cache}")]
    LoadFailed {
        group: String,
        upstream: Box<CatalogError>,
        cache: Box<CatalogError>,
    },
}

pub type Result<T> = std::result::Result<T, CatalogError>;
