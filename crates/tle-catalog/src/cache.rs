//! On-disk TLE cache.
//!
//! Layout: `<cache_dir>/<group>.tle` holds one 3-line record per block
//! with a trailing newline; `<cache_dir>/cache_meta.json` records the
//! last update instant and record count per group. Writes go through a
//! temp file and rename so an interrupted fetch never corrupts an
//! existing good cache. Directories are 0750 and files 0600 on Unix.

use crate::{CatalogError, Result};
use chrono::{DateTime, Utc};
use orbital_mechanics::tle::{parse_batch, Tle};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

const META_FILE: &str = "cache_meta.json";

#[cfg(unix)]
const DIR_MODE: u32 = 0o750;
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Freshness metadata for one cached group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupMeta {
    pub updated_at: DateTime<Utc>,
    pub count: usize,
}

/// The `cache_meta.json` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheMeta {
    pub groups: HashMap<String, GroupMeta>,
}

/// File-backed TLE cache rooted at one directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> FileCache {
        FileCache { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a group's cache file, `<dir>/<group>.tle` (lowercased).
    pub fn group_path(&self, group: &str) -> PathBuf {
        self.dir.join(format!("{}.tle", group.to_lowercase()))
    }

    /// Write a group's records as concatenated 3-line blocks.
    pub async fn write_group(&self, group: &str, records: &[Tle]) -> Result<()> {
        self.ensure_dir().await?;

        let mut text = String::new();
        for tle in records {
            text.push_str(&tle.to_tle_string());
        }

        let path = self.group_path(group);
        self.write_atomic(&path, text.as_bytes()).await?;
        self.update_meta(group, records.len()).await
    }

    /// Read and parse a group's cache file. Unparseable records are
    /// skipped with a warning, matching the store's batch policy.
    pub async fn read_group(&self, group: &str) -> Result<Vec<Tle>> {
        let path = self.group_path(group);
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| CatalogError::CacheRead {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let (records, errors) = parse_batch(&text);
        if !errors.is_empty() {
            if records.is_empty() {
                return Err(CatalogError::CacheRead {
                    path: path.display().to_string(),
                    reason: format!("{} corrupt record(s), none parsed", errors.len()),
                });
            }
            warn!(
                group,
                skipped = errors.len(),
                "skipping corrupt cached TLE records"
            );
        }
        Ok(records)
    }

    /// Load `cache_meta.json`; a missing file is an empty map.
    pub async fn read_meta(&self) -> Result<CacheMeta> {
        let path = self.dir.join(META_FILE);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(CacheMeta::default())
            }
            Err(e) => {
                return Err(CatalogError::CacheRead {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        };
        serde_json::from_slice(&bytes).map_err(|e| CatalogError::MetaParse(e.to_string()))
    }

    pub async fn write_meta(&self, meta: &CacheMeta) -> Result<()> {
        self.ensure_dir().await?;
        let path = self.dir.join(META_FILE);
        let json = serde_json::to_vec_pretty(meta)
            .map_err(|e| CatalogError::MetaParse(e.to_string()))?;
        self.write_atomic(&path, &json).await
    }

    /// Record a successful group refresh in the metadata.
    pub async fn update_meta(&self, group: &str, count: usize) -> Result<()> {
        let mut meta = self.read_meta().await.unwrap_or_default();
        meta.groups.insert(
            group.to_lowercase(),
            GroupMeta {
                updated_at: Utc::now(),
                count,
            },
        );
        self.write_meta(&meta).await
    }

    /// A group is fresh iff its last update is younger than the age cap.
    pub async fn is_fresh(&self, group: &str, max_age_days: f64) -> bool {
        match self.read_meta().await {
            Ok(meta) => meta
                .groups
                .get(&group.to_lowercase())
                .map(|g| {
                    let age_days =
                        (Utc::now() - g.updated_at).num_milliseconds() as f64 / 86_400_000.0;
                    age_days < max_age_days
                })
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CatalogError::CacheWrite {
                path: self.dir.display().to_string(),
                reason: e.to_string(),
            })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = tokio::fs::set_permissions(
                &self.dir,
                std::fs::Permissions::from_mode(DIR_MODE),
            )
            .await;
        }
        Ok(())
    }

    /// Create-then-rename write; the temp file lands in the same
    /// directory so the rename stays on one filesystem.
    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = path.with_extension("tmp");
        let write_err = |e: std::io::Error| CatalogError::CacheWrite {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        tokio::fs::write(&tmp, bytes).await.map_err(write_err)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = tokio::fs::set_permissions(
                &tmp,
                std::fs::Permissions::from_mode(FILE_MODE),
            )
            .await;
        }
        tokio::fs::rename(&tmp, path).await.map_err(write_err)
    }
}
