//! Client behavior against a mock upstream: retries, rate limiting,
//! not-found mapping and deadlines.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tle_catalog::{CatalogClient, CatalogError, ClientConfig};

const ISS_L1: &str = "1 25544U 98067A   24001.50000000  .00016717  00000-0  10270-3 0  9997";
const ISS_L2: &str = "2 25544  51.6400 247.4627 0006703 130.5360 325.0288 15.49815571423401";

fn iss_text() -> String {
    format!("ISS (ZARYA)\n{ISS_L1}\n{ISS_L2}\n")
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr, tweak: impl FnOnce(&mut ClientConfig)) -> CatalogClient {
    let mut config = ClientConfig {
        base_url: format!("http://{addr}/NORAD/elements/gp.php"),
        rate_limit: Duration::ZERO,
        retry_backoff: Duration::from_millis(10),
        ..ClientConfig::default()
    };
    tweak(&mut config);
    CatalogClient::new(config).unwrap()
}

#[tokio::test]
async fn retry_succeeds_on_third_attempt() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/NORAD/elements/gp.php",
        get(move || {
            let hits = counter.clone();
            async move {
                if hits.fetch_add(1, Ordering::SeqCst) < 2 {
                    (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
                } else {
                    (StatusCode::OK, iss_text()).into_response()
                }
            }
        }),
    );
    let addr = serve(app).await;
    let client = client_for(addr, |c| c.max_retries = 3);

    let tle = client.fetch_by_catalog_number(25544).await.unwrap();
    assert_eq!(tle.norad_id, 25544);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhausted_retries_surface_last_error() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/NORAD/elements/gp.php",
        get(move || {
            let hits = counter.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                (StatusCode::BAD_GATEWAY, "still broken").into_response()
            }
        }),
    );
    let addr = serve(app).await;
    let client = client_for(addr, |c| c.max_retries = 3);

    let err = client.fetch_group("stations").await.unwrap_err();
    assert!(matches!(err, CatalogError::ServerError(502)));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn no_gp_data_body_maps_to_not_found_without_retry() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/NORAD/elements/gp.php",
        get(move || {
            let hits = counter.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                (StatusCode::OK, "No GP data found").into_response()
            }
        }),
    );
    let addr = serve(app).await;
    let client = client_for(addr, |c| c.max_retries = 3);

    let err = client.fetch_by_catalog_number(1).await.unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn http_404_maps_to_not_found_without_retry() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/NORAD/elements/gp.php",
        get(move || {
            let hits = counter.clone();
            async move { (StatusCode::NOT_FOUND, format!("{}", hits.fetch_add(1, Ordering::SeqCst))).into_response() }
        }),
    );
    let addr = serve(app).await;
    let client = client_for(addr, |c| c.max_retries = 3);

    let err = client.fetch_group("stations").await.unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rate_limit_spaces_consecutive_requests() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/NORAD/elements/gp.php",
        get(move || {
            let hits = counter.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                (StatusCode::OK, iss_text()).into_response()
            }
        }),
    );
    let addr = serve(app).await;
    let client = client_for(addr, |c| c.rate_limit = Duration::from_millis(100));

    let start = Instant::now();
    for _ in 0..3 {
        client.fetch_by_catalog_number(25544).await.unwrap();
    }
    assert!(start.elapsed() >= Duration::from_millis(200));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn deadline_cancels_slow_upstream_promptly() {
    let app = Router::new().route(
        "/NORAD/elements/gp.php",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            (StatusCode::OK, iss_text()).into_response()
        }),
    );
    let addr = serve(app).await;
    let client = client_for(addr, |c| {
        c.request_timeout = Duration::from_millis(100);
        c.max_retries = 3;
    });

    let start = Instant::now();
    let err = client.fetch_by_catalog_number(25544).await.unwrap_err();
    assert!(matches!(err, CatalogError::Cancelled));
    assert!(start.elapsed() < Duration::from_secs(2), "not prompt: {:?}", start.elapsed());
}

#[tokio::test]
async fn rate_limited_status_retries_then_surfaces() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/NORAD/elements/gp.php",
        get(move || {
            let hits = counter.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response()
            }
        }),
    );
    let addr = serve(app).await;
    let client = client_for(addr, |c| c.max_retries = 2);

    let err = client.fetch_group("stations").await.unwrap_err();
    assert!(matches!(err, CatalogError::RateLimited));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn parallel_group_fetch_merges_and_aggregates() {
    let app = Router::new().route(
        "/NORAD/elements/gp.php",
        get(
            |axum::extract::Query(q): axum::extract::Query<
                std::collections::HashMap<String, String>,
            >| async move {
                match q.get("GROUP").map(String::as_str) {
                    Some("stations") => (StatusCode::OK, iss_text()).into_response(),
                    Some("weather") => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
                    }
                    _ => (StatusCode::OK, "No GP data found").into_response(),
                }
            },
        ),
    );
    let addr = serve(app).await;
    let client = client_for(addr, |c| c.max_retries = 1);

    let groups = vec!["stations".to_string(), "weather".to_string()];
    let (records, error) = client.fetch_groups_parallel(&groups).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].norad_id, 25544);
    assert!(matches!(error, Some(CatalogError::ServerError(500))));
}
