//! Fetch the `stations` group from Celestrak, then print the ISS ground
//! track as the JSON consumed by map renderers.
//!
//! Run with: `cargo run -p tle-catalog --example track_stations`

use anyhow::Result;
use chrono::Utc;
use orbital_mechanics::ground_track;
use std::sync::Arc;
use tle_catalog::{CatalogClient, CatalogConfig, TleStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "tle_catalog=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CatalogConfig {
        groups: vec!["stations".to_string()],
        ..CatalogConfig::default()
    };
    config.validate()?;

    let client = Arc::new(CatalogClient::with_defaults()?);
    let store = Arc::new(TleStore::new(config, client));
    store.start().await;

    tracing::info!(count = store.count().await, "catalog ready");

    match store.get(25544).await {
        Some(tle) => {
            let track = ground_track::generate_default(&tle, Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&track)?);
        }
        None => tracing::warn!("ISS not present in the stations group"),
    }

    store.stop().await;
    Ok(())
}
