//! Satellite ephemeris tracker.
//!
//! Ingests the public ISS OEM feed, caches the state vectors in a key-value
//! store and answers position, speed and ground-location queries over HTTP.

pub mod cache;
pub mod config;
pub mod epoch;
pub mod error;
pub mod feed;
pub mod geocode;
pub mod geometry;
pub mod loader;
pub mod model;
pub mod parser;
pub mod server;
pub mod storage;
pub mod store;
pub mod tracker;

use std::sync::Arc;

use crate::cache::{Cache, MemoryCache, SegmentCache};
use crate::config::Config;
use crate::error::CacheError;

/// Opens the cache selected by the configuration.
/// A file-backed cache is compacted before use.
pub fn open_cache(config: &Config) -> Result<Arc<dyn Cache>, CacheError> {
    match &config.cache_file {
        Some(path) => {
            let cache = SegmentCache::open(path, config.strict_durability)?;
            cache.compact()?;
            Ok(Arc::new(cache))
        }
        None => Ok(Arc::new(MemoryCache::new())),
    }
}
