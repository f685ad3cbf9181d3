use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::TrackerResult;
use crate::feed::{parse_feed, FeedSource};
use crate::store::EphemerisStore;

/// Populates the store from the feed.
///
/// Loads are serialized behind `last_load`, so concurrent requests that find
/// the store stale trigger a single fetch.
pub struct EphemerisLoader<F> {
    feed: F,
    store: EphemerisStore,
    refresh: Duration,
    last_load: Mutex<Option<Instant>>,
}

impl<F: FeedSource> EphemerisLoader<F> {
    /// `refresh` of zero reloads before every read.
    pub fn new(feed: F, store: EphemerisStore, refresh: Duration) -> Self {
        Self {
            feed,
            store,
            refresh,
            last_load: Mutex::new(None),
        }
    }

    /// Fetches and stores the whole feed. Returns the number of state vectors.
    pub async fn load(&self) -> TrackerResult<usize> {
        let mut last_load = self.last_load.lock().await;
        let count = self.load_locked().await?;
        *last_load = Some(Instant::now());
        Ok(count)
    }

    async fn load_locked(&self) -> TrackerResult<usize> {
        let started = Instant::now();
        let document = self.feed.fetch().await?;

        // Decode everything before touching the store
        let vectors = parse_feed(&document)?;
        for vector in &vectors {
            self.store.put(vector)?;
        }

        info!(
            records = vectors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ephemeris feed loaded"
        );
        Ok(vectors.len())
    }

    /// Loads when the store is empty or the last load is older than `refresh`.
    /// A failed refresh is tolerated while older data is still available.
    pub async fn ensure_fresh(&self) -> TrackerResult<()> {
        let mut last_load = self.last_load.lock().await;

        let stale = match *last_load {
            Some(at) => at.elapsed() >= self.refresh,
            None => true,
        };
        let empty = self.store.is_empty()?;
        if !stale && !empty {
            return Ok(());
        }

        match self.load_locked().await {
            Ok(_) => {
                *last_load = Some(Instant::now());
                Ok(())
            }
            Err(e) if !empty => {
                warn!("feed refresh failed, serving cached ephemeris: {}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
