use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use sattrack::config::Config;
use sattrack::feed::HttpFeed;
use sattrack::geocode::NominatimGeocoder;
use sattrack::server::TrackerServer;
use sattrack::tracker::Tracker;

#[tokio::main]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,sattrack=info");
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_level(true)
        .init();

    let config = Config::parse();
    if let Err(e) = run(config).await {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("--- Satellite Tracker ---");
    info!("Feed: {}", config.feed_url);
    info!("Geocoder: {}", config.geocoder_url);
    info!(
        "Cache: {}",
        config
            .cache_file
            .as_ref()
            .map_or_else(|| "in-memory".to_string(), |p| p.display().to_string())
    );
    info!("Refresh: {}s, upstream timeout: {}s", config.refresh_secs, config.timeout_secs);

    let cache = sattrack::open_cache(&config)?;
    let feed = HttpFeed::new(&config.feed_url, config.timeout(), &config.user_agent)?;
    let geocoder = NominatimGeocoder::new(&config.geocoder_url, config.timeout(), &config.user_agent)?;
    let tracker = Arc::new(Tracker::new(cache, feed, geocoder, config.refresh()));

    if !config.skip_preload {
        match tracker.load().await {
            Ok(count) => info!("Preloaded {} state vectors", count),
            Err(e) => warn!("Preload failed, will retry on first request: {}", e),
        }
    }

    let server = TrackerServer::new(tracker);
    server
        .run(config.addr, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down.");
        })
        .await?;

    Ok(())
}
