//! Concurrent TLE store.
//!
//! Process-wide catalog of TLE records with group and name indexes, kept
//! warm by a background refresh loop. All three maps sit behind one
//! reader-writer lock which is never held across I/O: refresh batches
//! are fetched and parsed first, then merged under a short exclusive
//! section.

use crate::cache::FileCache;
use crate::client::CatalogClient;
use crate::config::CatalogConfig;
use crate::{CatalogError, Result};
use chrono::Utc;
use orbital_mechanics::Tle;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Default)]
struct Indexes {
    /// Primary index; owns the records.
    by_id: HashMap<u32, Tle>,
    /// Lowercased group name → catalog numbers.
    by_group: HashMap<String, Vec<u32>>,
    /// Lowercased satellite name → catalog numbers.
    by_name: HashMap<String, Vec<u32>>,
}

impl Indexes {
    fn insert(&mut self, tle: Tle, group: Option<&str>) {
        let id = tle.norad_id;

        // a rename must not leave a stale name-index entry behind
        if let Some(old) = self.by_id.get(&id) {
            if !old.name.eq_ignore_ascii_case(&tle.name) {
                self.remove_name(&old.name.to_lowercase(), id);
            }
        }

        if !tle.name.is_empty() {
            let ids = self.by_name.entry(tle.name.to_lowercase()).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        if let Some(group) = group {
            let ids = self.by_group.entry(group.to_lowercase()).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        self.by_id.insert(id, tle);
    }

    fn remove_name(&mut self, name_lc: &str, id: u32) {
        if let Some(ids) = self.by_name.get_mut(name_lc) {
            ids.retain(|&other| other != id);
            if ids.is_empty() {
                self.by_name.remove(name_lc);
            }
        }
    }
}

/// Shared between the store façade and its refresh task.
struct Inner {
    config: CatalogConfig,
    client: Arc<CatalogClient>,
    cache: FileCache,
    state: RwLock<Indexes>,
}

impl Inner {
    /// Merge a refreshed batch for `group`. The group's id list is
    /// replaced wholesale so records dropped upstream leave the group.
    async fn merge_group(&self, group: &str, records: Vec<Tle>) {
        let mut ids: Vec<u32> = Vec::with_capacity(records.len());
        for tle in &records {
            if !ids.contains(&tle.norad_id) {
                ids.push(tle.norad_id);
            }
        }

        let mut state = self.state.write().await;
        for tle in records {
            state.insert(tle, None);
        }
        state.by_group.insert(group.to_lowercase(), ids);
    }

    async fn load_group(&self, group: &str) -> Result<usize> {
        let group_lc = group.to_lowercase();

        let upstream_error = match self.client.fetch_group(&group_lc).await {
            Ok(records) => {
                if let Err(e) = self.cache.write_group(&group_lc, &records).await {
                    warn!(group = %group_lc, error = %e, "cache write failed");
                }
                let count = records.len();
                self.merge_group(&group_lc, records).await;
                info!(group = %group_lc, count, "group loaded from upstream");
                return Ok(count);
            }
            Err(e) => e,
        };

        warn!(group = %group_lc, error = %upstream_error, "upstream fetch failed, trying cache");
        match self.cache.read_group(&group_lc).await {
            Ok(records) => {
                let count = records.len();
                self.merge_group(&group_lc, records).await;
                info!(group = %group_lc, count, "group loaded from cache");
                Ok(count)
            }
            Err(cache_error) => Err(CatalogError::LoadFailed {
                group: group_lc,
                upstream: Box::new(upstream_error),
                cache: Box::new(cache_error),
            }),
        }
    }

    async fn load_all_groups(&self) -> Result<()> {
        let mut last_error = None;
        for group in self.config.groups.clone() {
            if let Err(e) = self.load_group(&group).await {
                error!(group = %group, error = %e, "group load failed");
                last_error = Some(e);
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Thread-safe TLE catalog with indexes, cache and background refresh.
pub struct TleStore {
    inner: Arc<Inner>,
    shutdown: watch::Sender<bool>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl TleStore {
    /// Build a store around an injected upstream client. The cache lives
    /// under `config.cache_dir`.
    pub fn new(config: CatalogConfig, client: Arc<CatalogClient>) -> TleStore {
        let cache = FileCache::new(&config.cache_dir);
        let (shutdown, _) = watch::channel(false);
        TleStore {
            inner: Arc::new(Inner {
                config,
                client,
                cache,
                state: RwLock::new(Indexes::default()),
            }),
            shutdown,
            refresh_task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.inner.config
    }

    // ---- queries -----------------------------------------------------

    pub async fn get(&self, norad_id: u32) -> Option<Tle> {
        self.inner.state.read().await.by_id.get(&norad_id).cloned()
    }

    /// Case-insensitive group lookup; unknown groups yield an empty list.
    pub async fn get_by_group(&self, group: &str) -> Vec<Tle> {
        let state = self.inner.state.read().await;
        state
            .by_group
            .get(&group.to_lowercase())
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.by_id.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Exact lowercased name lookup; falls back to a substring scan
    /// across all names when nothing matches exactly.
    pub async fn get_by_name(&self, name: &str) -> Vec<Tle> {
        let needle = name.to_lowercase();
        let state = self.inner.state.read().await;

        if let Some(ids) = state.by_name.get(&needle) {
            return ids
                .iter()
                .filter_map(|id| state.by_id.get(id).cloned())
                .collect();
        }

        let mut out: Vec<Tle> = state
            .by_name
            .iter()
            .filter(|(key, _)| key.contains(&needle))
            .flat_map(|(_, ids)| ids.iter())
            .filter_map(|id| state.by_id.get(id).cloned())
            .collect();
        out.sort_by_key(|t| t.norad_id);
        out.dedup_by_key(|t| t.norad_id);
        out
    }

    pub async fn get_all(&self) -> Vec<Tle> {
        self.inner.state.read().await.by_id.values().cloned().collect()
    }

    pub async fn count(&self) -> usize {
        self.inner.state.read().await.by_id.len()
    }

    /// Records older than `max_tle_age_days`.
    pub async fn stale_count(&self) -> usize {
        let now = Utc::now();
        self.inner
            .state
            .read()
            .await
            .by_id
            .values()
            .filter(|t| t.age_days(now) > self.inner.config.max_tle_age_days)
            .count()
    }

    pub async fn groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = self
            .inner
            .state
            .read()
            .await
            .by_group
            .keys()
            .cloned()
            .collect();
        groups.sort_unstable();
        groups
    }

    pub async fn group_count(&self, group: &str) -> usize {
        self.inner
            .state
            .read()
            .await
            .by_group
            .get(&group.to_lowercase())
            .map_or(0, Vec::len)
    }

    // ---- mutation ----------------------------------------------------

    /// Upsert one record. Re-adding the same record is a no-op for the
    /// indexes.
    pub async fn add(&self, tle: Tle) {
        self.inner.state.write().await.insert(tle, None);
    }

    /// Upsert one record under a group.
    pub async fn add_with_group(&self, tle: Tle, group: &str) {
        self.inner.state.write().await.insert(tle, Some(group));
    }

    // ---- loading -----------------------------------------------------

    /// Load one group from the upstream, falling back to the file cache.
    ///
    /// On upstream success the records are written back to the cache and
    /// the metadata is touched. Only when both paths fail does the store
    /// stay untouched and a composite error surface.
    pub async fn load_group(&self, group: &str) -> Result<usize> {
        self.inner.load_group(group).await
    }

    /// Load every configured group, continuing past per-group failures.
    /// The last error seen is returned so callers can decide policy.
    pub async fn load_all_groups(&self) -> Result<()> {
        self.inner.load_all_groups().await
    }

    // ---- lifecycle ---------------------------------------------------

    /// Initial load plus exactly one background refresh loop.
    pub async fn start(&self) {
        if let Err(e) = self.inner.load_all_groups().await {
            warn!(error = %e, "initial catalog load incomplete");
        }

        let mut task = self.refresh_task.lock().await;
        if task.is_some() {
            debug!("refresh loop already running");
            return;
        }

        let inner = Arc::clone(&self.inner);
        let interval = self.inner.config.effective_interval();
        let mut shutdown = self.shutdown.subscribe();
        *task = Some(tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!("catalog refresh tick");
                        if let Err(e) = inner.load_all_groups().await {
                            warn!(error = %e, "catalog refresh incomplete");
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
            debug!("catalog refresh loop stopped");
        }));
        info!(interval_secs = interval.as_secs(), "catalog refresh loop started");
    }

    /// Cooperatively terminate the refresh loop and join it. Idempotent.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.refresh_task.lock().await.take() {
            let _ = handle.await;
        }
    }
}
