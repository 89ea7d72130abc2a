//! Catalog configuration.

use crate::groups::is_known_group;
use crate::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Refresh ticks are never allowed to fire more often than this.
pub const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for [`crate::TleStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Upstream groups to load and keep refreshed.
    pub groups: Vec<String>,
    /// Background refresh period; clamped to at least one minute.
    pub update_interval: Duration,
    /// Directory for `<group>.tle` files and `cache_meta.json`.
    pub cache_dir: PathBuf,
    /// Records older than this many days count as stale.
    pub max_tle_age_days: f64,
    /// Reserved for out-of-scope metadata enrichment.
    pub enable_metadata: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig {
            groups: vec![
                "stations".to_string(),
                "amateur".to_string(),
                "cubesat".to_string(),
            ],
            update_interval: Duration::from_secs(6 * 3600),
            cache_dir: PathBuf::from("data/tle_cache"),
            max_tle_age_days: 7.0,
            enable_metadata: false,
        }
    }
}

impl CatalogConfig {
    /// Reject group names outside the fixed allowlist.
    pub fn validate(&self) -> Result<()> {
        for group in &self.groups {
            if !is_known_group(group) {
                return Err(CatalogError::UnknownGroup(group.clone()));
            }
        }
        Ok(())
    }

    /// The refresh period with the one-minute floor applied.
    pub fn effective_interval(&self) -> Duration {
        self.update_interval.max(MIN_UPDATE_INTERVAL)
    }
}
