use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::feed::DEFAULT_FEED_URL;
use crate::geocode::DEFAULT_GEOCODER_URL;

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about = "Satellite ephemeris tracker HTTP API", long_about = None)]
pub struct Config {
    /// Address the HTTP API binds to
    #[clap(long, default_value = "0.0.0.0:5000")]
    pub addr: SocketAddr,

    /// Ephemeris feed (OEM XML)
    #[clap(long, default_value = DEFAULT_FEED_URL)]
    pub feed_url: String,

    /// Reverse geocoding endpoint (Nominatim compatible)
    #[clap(long, default_value = DEFAULT_GEOCODER_URL)]
    pub geocoder_url: String,

    #[clap(long, default_value = "iss-tracker")]
    pub user_agent: String,

    /// Persist the cache to this segment file instead of keeping it in memory
    #[clap(long)]
    pub cache_file: Option<PathBuf>,

    /// fsync every cache write
    #[clap(long)]
    pub strict_durability: bool,

    /// Seconds before cached ephemeris is refetched (0 = before every read)
    #[clap(long, default_value = "3600")]
    pub refresh_secs: u64,

    /// Timeout for feed and geocoder requests
    #[clap(long, default_value = "10")]
    pub timeout_secs: u64,

    /// Do not load the feed before serving
    #[clap(long)]
    pub skip_preload: bool,
}

impl Config {
    pub fn refresh(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::parse_from(["sattrack"]);
        assert_eq!(config.addr, "0.0.0.0:5000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.feed_url, DEFAULT_FEED_URL);
        assert_eq!(config.refresh(), Duration::from_secs(3600));
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert!(config.cache_file.is_none());
        assert!(!config.skip_preload);
    }

    #[test]
    fn overrides() {
        let config = Config::parse_from([
            "sattrack",
            "--addr",
            "127.0.0.1:8080",
            "--cache-file",
            "/tmp/iss.seg",
            "--refresh-secs",
            "0",
            "--strict-durability",
        ]);
        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.cache_file, Some(PathBuf::from("/tmp/iss.seg")));
        assert_eq!(config.refresh(), Duration::ZERO);
        assert!(config.strict_durability);
    }
}
