//! Upstream catalog client.
//!
//! Fetches TLE bundles from the Celestrak `gp.php` endpoint by catalog
//! number, group or raw URL. All requests carry an identifying user agent
//! and respect a process-wide minimum spacing; transient failures (5xx,
//! 429, network) are retried with exponential backoff, while 404 and the
//! literal `No GP data found` body map to [`CatalogError::NotFound`] and
//! are never retried. Deadlines surface as [`CatalogError::Cancelled`].

use crate::{CatalogError, Result};
use orbital_mechanics::tle::{parse_batch, Tle};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default upstream endpoint.
pub const DEFAULT_BASE_URL: &str = "https://celestrak.org/NORAD/elements/gp.php";

/// Body Celestrak returns (with HTTP 200) when a query matches nothing.
const NO_GP_DATA: &str = "No GP data found";

/// Client tuning knobs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the `gp.php` endpoint; tests point this at a mock.
    pub base_url: String,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Minimum spacing between the start of any two requests.
    pub rate_limit: Duration,
    /// Total attempts per request, including the first.
    pub max_retries: u32,
    /// Base backoff; attempt n sleeps `backoff × 2^(n−1)`.
    pub retry_backoff: Duration,
    /// Per-request deadline.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: concat!("tle-catalog/", env!("CARGO_PKG_VERSION")).to_string(),
            rate_limit: Duration::from_secs(2),
            max_retries: 3,
            retry_backoff: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP client for the upstream catalog.
pub struct CatalogClient {
    config: ClientConfig,
    http: reqwest::Client,
    last_request: Mutex<Option<Instant>>,
}

impl CatalogClient {
    pub fn new(config: ClientConfig) -> Result<CatalogClient> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        Ok(CatalogClient {
            config,
            http,
            last_request: Mutex::new(None),
        })
    }

    pub fn with_defaults() -> Result<CatalogClient> {
        CatalogClient::new(ClientConfig::default())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch the single current record for a catalog number.
    pub async fn fetch_by_catalog_number(&self, norad_id: u32) -> Result<Tle> {
        let url = format!("{}?CATNR={}&FORMAT=TLE", self.config.base_url, norad_id);
        let mut records = self.fetch_url(&url).await?;
        let first = records.drain(..).next();
        first.ok_or_else(|| CatalogError::NotFound(format!("CATNR {norad_id}")))
    }

    /// Fetch every record of a named group.
    pub async fn fetch_group(&self, group: &str) -> Result<Vec<Tle>> {
        let url = format!("{}?GROUP={}&FORMAT=TLE", self.config.base_url, group);
        let records = self.fetch_url(&url).await?;
        info!(group, count = records.len(), "fetched TLE group");
        Ok(records)
    }

    /// Fetch and parse a TLE bundle from an arbitrary URL.
    pub async fn fetch_url(&self, url: &str) -> Result<Vec<Tle>> {
        let body = self.get_text(url).await?;
        let (records, errors) = parse_batch(&body);
        if !errors.is_empty() {
            if records.is_empty() {
                return Err(CatalogError::Parse(format!(
                    "{} record(s) rejected, none parsed",
                    errors.len()
                )));
            }
            warn!(skipped = errors.len(), "skipping unparseable TLE records");
        }
        if records.is_empty() {
            return Err(CatalogError::NotFound(url.to_string()));
        }
        Ok(records)
    }

    /// Fetch several groups concurrently.
    ///
    /// One task per group, each observing the shared rate limiter, so
    /// requests still serialize at the configured spacing. Successful
    /// records are merged; the last per-group error is returned alongside
    /// them.
    pub async fn fetch_groups_parallel(
        &self,
        groups: &[String],
    ) -> (Vec<Tle>, Option<CatalogError>) {
        let fetches = groups.iter().map(|group| async move {
            (group.clone(), self.fetch_group(group).await)
        });
        let results = futures::future::join_all(fetches).await;

        let mut records = Vec::new();
        let mut last_error = None;
        for (group, result) in results {
            match result {
                Ok(mut tles) => records.append(&mut tles),
                Err(e) => {
                    warn!(group = %group, error = %e, "group fetch failed");
                    last_error = Some(e);
                }
            }
        }
        (records, last_error)
    }

    /// GET with rate limiting and retry; returns the response body.
    async fn get_text(&self, url: &str) -> Result<String> {
        let attempts = self.config.max_retries.max(1);
        let mut last_error = CatalogError::Transport("no attempts made".to_string());

        for attempt in 1..=attempts {
            self.wait_for_slot().await;
            debug!(url, attempt, "catalog request");

            match self.http.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(CatalogError::NotFound(url.to_string()));
                    }
                    if status.is_success() {
                        let body = response
                            .text()
                            .await
                            .map_err(|e| CatalogError::Transport(e.to_string()))?;
                        if body.trim() == NO_GP_DATA {
                            return Err(CatalogError::NotFound(url.to_string()));
                        }
                        return Ok(body);
                    }
                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = CatalogError::RateLimited;
                    } else if status.is_server_error() {
                        last_error = CatalogError::ServerError(status.as_u16());
                    } else {
                        // unexpected 4xx: not transient, do not retry
                        return Err(CatalogError::ServerError(status.as_u16()));
                    }
                }
                Err(e) if e.is_timeout() => return Err(CatalogError::Cancelled),
                Err(e) => last_error = CatalogError::Transport(e.to_string()),
            }

            if attempt < attempts {
                let backoff = self.config.retry_backoff * 2u32.pow(attempt - 1);
                debug!(attempt, ?backoff, "retrying after backoff");
                tokio::time::sleep(backoff).await;
            }
        }
        Err(last_error)
    }

    /// Block until the minimum request spacing is satisfied, then claim
    /// the slot. The mutex is released while sleeping.
    async fn wait_for_slot(&self) {
        loop {
            let mut last = self.last_request.lock().await;
            let now = Instant::now();
            match *last {
                Some(prev) if now < prev + self.config.rate_limit => {
                    let wait = (prev + self.config.rate_limit) - now;
                    drop(last);
                    tokio::time::sleep(wait).await;
                }
                _ => {
                    *last = Some(now);
                    return;
                }
            }
        }
    }
}
