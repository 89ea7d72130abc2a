//! Store behavior end-to-end: upstream loads, cache fallback and the
//! refresh lifecycle.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tle_catalog::{
    CatalogClient, CatalogConfig, CatalogError, ClientConfig, FileCache, TleStore,
};

const ISS_L1: &str = "1 25544U 98067A   24001.50000000  .00016717  00000-0  10270-3 0  9997";
const ISS_L2: &str = "2 25544  51.6400 247.4627 0006703 130.5360 325.0288 15.49815571423401";
const NOAA_L1: &str = "1 33591U 09005A   24001.50000000  .00000123  00000-0  98765-4 0  9992";
const NOAA_L2: &str = "2 33591  99.1000 120.0000 0013000  30.0000 330.0000 14.12000000123451";

fn bundle() -> String {
    format!("ISS (ZARYA)\n{ISS_L1}\n{ISS_L2}\nNOAA 19\n{NOAA_L1}\n{NOAA_L2}\n")
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn make_store(addr: SocketAddr, dir: &std::path::Path, groups: &[&str]) -> Arc<TleStore> {
    let client = CatalogClient::new(ClientConfig {
        base_url: format!("http://{addr}/NORAD/elements/gp.php"),
        rate_limit: Duration::ZERO,
        retry_backoff: Duration::from_millis(10),
        max_retries: 1,
        ..ClientConfig::default()
    })
    .unwrap();

    let config = CatalogConfig {
        groups: groups.iter().map(|g| g.to_string()).collect(),
        cache_dir: dir.to_path_buf(),
        ..CatalogConfig::default()
    };
    Arc::new(TleStore::new(config, Arc::new(client)))
}

#[tokio::test]
async fn load_group_installs_records_and_cache() {
    let app = Router::new().route(
        "/NORAD/elements/gp.php",
        get(|| async { (StatusCode::OK, bundle()).into_response() }),
    );
    let addr = serve(app).await;
    let dir = tempfile::tempdir().unwrap();
    let store = make_store(addr, dir.path(), &["stations"]);

    let count = store.load_group("stations").await.unwrap();
    assert_eq!(count, 2);
    assert_eq!(store.count().await, 2);
    assert_eq!(store.get_by_group("stations").await.len(), 2);
    assert_eq!(store.get(25544).await.unwrap().name, "ISS (ZARYA)");

    // records and metadata landed on disk
    assert!(dir.path().join("stations.tle").exists());
    let cache = FileCache::new(dir.path());
    assert!(cache.is_fresh("stations", 1.0).await);
    assert_eq!(cache.read_meta().await.unwrap().groups["stations"].count, 2);
}

#[tokio::test]
async fn load_group_falls_back_to_cache() {
    let app = Router::new().route(
        "/NORAD/elements/gp.php",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "down").into_response() }),
    );
    let addr = serve(app).await;
    let dir = tempfile::tempdir().unwrap();

    // pre-populate the cache the way a previous run would have
    std::fs::create_dir_all(dir.path()).unwrap();
    std::fs::write(dir.path().join("test.tle"), bundle()).unwrap();

    let store = make_store(addr, dir.path(), &["test"]);
    let count = store.load_group("test").await.unwrap();
    assert_eq!(count, 2);
    assert_eq!(store.count().await, 2);
    assert_eq!(store.get_by_group("test").await.len(), 2);
}

#[tokio::test]
async fn load_group_fails_when_both_paths_fail() {
    let app = Router::new().route(
        "/NORAD/elements/gp.php",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "down").into_response() }),
    );
    let addr = serve(app).await;
    let dir = tempfile::tempdir().unwrap();
    let store = make_store(addr, dir.path(), &["stations"]);

    let err = store.load_group("stations").await.unwrap_err();
    match err {
        CatalogError::LoadFailed { group, upstream, cache } => {
            assert_eq!(group, "stations");
            assert!(matches!(*upstream, CatalogError::ServerError(500)));
            assert!(matches!(*cache, CatalogError::CacheRead { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.count().await, 0);
}

#[tokio::test]
async fn load_all_groups_is_all_or_partial() {
    let app = Router::new().route(
        "/NORAD/elements/gp.php",
        get(
            |axum::extract::Query(q): axum::extract::Query<
                std::collections::HashMap<String, String>,
            >| async move {
                match q.get("GROUP").map(String::as_str) {
                    Some("stations") => (StatusCode::OK, bundle()).into_response(),
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "down").into_response(),
                }
            },
        ),
    );
    let addr = serve(app).await;
    let dir = tempfile::tempdir().unwrap();
    let store = make_store(addr, dir.path(), &["stations", "weather"]);

    // weather fails, stations still installs
    let err = store.load_all_groups().await.unwrap_err();
    assert!(matches!(err, CatalogError::LoadFailed { .. }));
    assert_eq!(store.count().await, 2);
    assert_eq!(store.group_count("stations").await, 2);
    assert_eq!(store.group_count("weather").await, 0);
}

#[tokio::test]
async fn start_loads_then_stop_joins() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/NORAD/elements/gp.php",
        get(move || {
            let hits = counter.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                (StatusCode::OK, bundle()).into_response()
            }
        }),
    );
    let addr = serve(app).await;
    let dir = tempfile::tempdir().unwrap();
    let store = make_store(addr, dir.path(), &["stations"]);

    store.start().await;
    assert_eq!(store.count().await, 2);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // stop is prompt (the first tick is an interval away) and idempotent
    let stopped = tokio::time::timeout(Duration::from_secs(2), store.stop()).await;
    assert!(stopped.is_ok());
    store.stop().await;
}

#[tokio::test]
async fn refresh_overwrites_without_duplicates() {
    let app = Router::new().route(
        "/NORAD/elements/gp.php",
        get(|| async { (StatusCode::OK, bundle()).into_response() }),
    );
    let addr = serve(app).await;
    let dir = tempfile::tempdir().unwrap();
    let store = make_store(addr, dir.path(), &["stations"]);

    store.load_group("stations").await.unwrap();
    store.load_group("stations").await.unwrap();

    assert_eq!(store.count().await, 2);
    assert_eq!(store.group_count("stations").await, 2);
    assert_eq!(store.get_by_name("iss (zarya)").await.len(), 1);
}
