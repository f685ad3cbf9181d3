use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::Cache;
use crate::epoch::{self, parse_epoch};
use crate::error::{TrackerError, TrackerResult};
use crate::feed::FeedSource;
use crate::geocode::Geocoder;
use crate::geometry::{geodetic, speed};
use crate::loader::EphemerisLoader;
use crate::model::{Location, Now, SpeedReport, StateVector, Summary};
use crate::store::EphemerisStore;

/// Answers the ephemeris queries. Every read first makes sure the store is
/// populated and fresh.
pub struct Tracker<F, G> {
    store: EphemerisStore,
    loader: EphemerisLoader<F>,
    geocoder: G,
}

impl<F: FeedSource, G: Geocoder> Tracker<F, G> {
    pub fn new(cache: Arc<dyn Cache>, feed: F, geocoder: G, refresh: Duration) -> Self {
        let store = EphemerisStore::new(cache);
        let loader = EphemerisLoader::new(feed, store.clone(), refresh);
        Self { store, loader, geocoder }
    }

    pub fn store(&self) -> &EphemerisStore {
        &self.store
    }

    /// Unconditional reload of the feed.
    pub async fn load(&self) -> TrackerResult<usize> {
        self.loader.load().await
    }

    pub async fn epochs(&self) -> TrackerResult<Vec<String>> {
        self.loader.ensure_fresh().await?;
        self.store.list_all()
    }

    pub async fn epochs_page(&self, limit: usize, offset: usize) -> TrackerResult<Vec<String>> {
        self.loader.ensure_fresh().await?;
        self.store.list_range(limit, offset)
    }

    pub async fn state_vector(&self, epoch: &str) -> TrackerResult<Option<StateVector>> {
        self.loader.ensure_fresh().await?;
        self.store.get(epoch)
    }

    pub async fn speed_at(&self, epoch: &str) -> TrackerResult<Option<SpeedReport>> {
        Ok(self.state_vector(epoch).await?.map(|sv| SpeedReport {
            speed: speed(&sv.velocity),
            epoch: sv.epoch,
        }))
    }

    pub async fn location_at(&self, epoch: &str) -> TrackerResult<Option<Location>> {
        match self.state_vector(epoch).await? {
            Some(sv) => Ok(Some(self.locate(&sv).await?)),
            None => Ok(None),
        }
    }

    async fn locate(&self, sv: &StateVector) -> TrackerResult<Location> {
        let geodetic = geodetic(&sv.position).map_err(|source| TrackerError::Geometry {
            epoch: sv.epoch.clone(),
            source,
        })?;
        let place = self.geocoder.reverse(geodetic.latitude, geodetic.longitude).await;

        Ok(Location {
            epoch: sv.epoch.clone(),
            geodetic,
            place,
        })
    }

    /// State vector whose epoch is nearest to `at`.
    pub async fn closest_to(&self, at: DateTime<Utc>) -> TrackerResult<Option<StateVector>> {
        self.loader.ensure_fresh().await?;
        let epochs = self.store.list_all()?;
        match epoch::closest(&epochs, at) {
            Some(epoch) => self.store.get(epoch),
            None => Ok(None),
        }
    }

    pub async fn closest_to_now(&self) -> TrackerResult<Option<StateVector>> {
        self.closest_to(Utc::now()).await
    }

    pub async fn now_at(&self, at: DateTime<Utc>) -> TrackerResult<Option<Now>> {
        let Some(sv) = self.closest_to(at).await? else {
            return Ok(None);
        };
        let location = self.locate(&sv).await?;
        Ok(Some(Now {
            speed: speed(&sv.velocity),
            location,
        }))
    }

    pub async fn now(&self) -> TrackerResult<Option<Now>> {
        self.now_at(Utc::now()).await
    }

    /// Time coverage and mean speed of everything stored.
    pub async fn summary(&self) -> TrackerResult<Option<Summary>> {
        self.loader.ensure_fresh().await?;
        let epochs = self.store.list_all()?;

        let timed: Vec<_> = epochs
            .iter()
            .filter_map(|e| parse_epoch(e).ok().map(|t| (e, t)))
            .collect();
        let (Some((start, start_time)), Some((end, end_time))) = (timed.first(), timed.last()) else {
            return Ok(None);
        };

        let mut total = 0.0;
        let mut samples = 0usize;
        for epoch in &epochs {
            if let Some(sv) = self.store.get(epoch)? {
                total += speed(&sv.velocity);
                samples += 1;
            }
        }
        if samples == 0 {
            return Ok(None);
        }

        Ok(Some(Summary {
            count: epochs.len(),
            start: start.to_string(),
            end: end.to_string(),
            start_readable: epoch::readable(start_time),
            end_readable: epoch::readable(end_time),
            average_speed: total / samples as f64,
        }))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::error::FeedError;
    use crate::feed::tests::TWO_VECTOR_FEED;
    use crate::geocode::GeoLookup;
    use chrono::TimeZone;

    pub(crate) struct StaticFeed(pub Option<String>);

    impl FeedSource for StaticFeed {
        async fn fetch(&self) -> Result<String, FeedError> {
            self.0.clone().ok_or(FeedError::Status(502))
        }
    }

    pub(crate) struct FixedGeocoder(pub GeoLookup);

    impl Geocoder for FixedGeocoder {
        async fn reverse(&self, _latitude: f64, _longitude: f64) -> GeoLookup {
            self.0.clone()
        }
    }

    fn tracker(feed: Option<&str>, place: GeoLookup) -> Tracker<StaticFeed, FixedGeocoder> {
        Tracker::new(
            Arc::new(MemoryCache::new()),
            StaticFeed(feed.map(str::to_string)),
            FixedGeocoder(place),
            Duration::from_secs(3600),
        )
    }

    fn round6(v: f64) -> f64 {
        (v * 1e6).round() / 1e6
    }

    const E0: &str = "2024-079T12:00:00.000Z";
    const E1: &str = "2024-079T13:00:00.000Z";

    #[tokio::test]
    async fn first_read_populates_the_store() {
        let t = tracker(Some(TWO_VECTOR_FEED), GeoLookup::NotFound);
        assert_eq!(t.epochs().await.unwrap(), vec![E0, E1]);
        assert_eq!(t.epochs_page(1, 1).await.unwrap(), vec![E1]);
        assert!(t.epochs_page(1, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn speed_at_known_epoch() {
        let t = tracker(Some(TWO_VECTOR_FEED), GeoLookup::NotFound);
        let report = t.speed_at(E0).await.unwrap().unwrap();
        assert_eq!(report.epoch, E0);
        assert_eq!(round6(report.speed), 7.071068);

        let second = t.speed_at(E1).await.unwrap().unwrap();
        assert_eq!(round6(second.speed), round6(200f64.sqrt()));
    }

    #[tokio::test]
    async fn unknown_epochs_are_not_found() {
        let t = tracker(Some(TWO_VECTOR_FEED), GeoLookup::NotFound);
        assert!(t.state_vector("2024-079T14:00:00.000Z").await.unwrap().is_none());
        assert!(t.speed_at("2024-079T14:00:00.000Z").await.unwrap().is_none());
        assert!(t.location_at("invalid-epoch").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn location_carries_geocoder_outcome() {
        let t = tracker(Some(TWO_VECTOR_FEED), GeoLookup::Found("Test Location, Earth".into()));
        let location = t.location_at(E0).await.unwrap().unwrap();

        let r = 14f64.sqrt();
        assert_eq!(location.epoch, E0);
        assert!((location.geodetic.latitude - (3.0 / r).asin().to_degrees()).abs() < 1e-9);
        assert!((location.geodetic.longitude - 2f64.atan2(1.0).to_degrees()).abs() < 1e-9);
        assert!((location.geodetic.altitude - (r - 6371.0)).abs() < 1e-9);
        assert_eq!(location.place, GeoLookup::Found("Test Location, Earth".into()));
    }

    #[tokio::test]
    async fn geocoder_failure_does_not_fail_the_lookup() {
        let t = tracker(Some(TWO_VECTOR_FEED), GeoLookup::Unavailable("timeout".into()));
        let location = t.location_at(E1).await.unwrap().unwrap();
        assert_eq!(location.place.display(), "Location data unavailable");
    }

    #[tokio::test]
    async fn degenerate_position_is_rejected() {
        let xml = TWO_VECTOR_FEED
            .replace("<X>1.0</X>", "<X>0</X>")
            .replace("<Y>2.0</Y>", "<Y>0</Y>")
            .replace("<Z>3.0</Z>", "<Z>0</Z>");
        let t = tracker(Some(&xml), GeoLookup::NotFound);
        let err = t.location_at(E0).await.unwrap_err();
        assert!(matches!(err, TrackerError::Geometry { ref epoch, .. } if epoch == E0));
    }

    #[tokio::test]
    async fn now_picks_the_closest_epoch() {
        let t = tracker(Some(TWO_VECTOR_FEED), GeoLookup::Found("Somewhere".into()));
        let at = Utc.with_ymd_and_hms(2024, 3, 19, 12, 40, 0).unwrap();

        let closest = t.closest_to(at).await.unwrap().unwrap();
        assert_eq!(closest.epoch, E1);

        let now = t.now_at(at).await.unwrap().unwrap();
        assert_eq!(now.location.epoch, E1);
        assert_eq!(round6(now.speed), round6(200f64.sqrt()));
        assert_eq!(now.location.place.display(), "Somewhere");
    }

    #[tokio::test]
    async fn now_on_empty_store_is_none() {
        let empty_feed = "<ndm><oem><body/></oem></ndm>";
        let t = tracker(Some(empty_feed), GeoLookup::NotFound);
        assert!(t.now().await.unwrap().is_none());
        assert!(t.closest_to_now().await.unwrap().is_none());
        assert!(t.summary().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreachable_feed_with_empty_store_is_an_error() {
        let t = tracker(None, GeoLookup::NotFound);
        assert!(matches!(t.now().await, Err(TrackerError::Feed(FeedError::Status(502)))));
    }

    #[tokio::test]
    async fn summary_covers_the_dataset() {
        let t = tracker(Some(TWO_VECTOR_FEED), GeoLookup::NotFound);
        let summary = t.summary().await.unwrap().unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.start, E0);
        assert_eq!(summary.end, E1);
        assert_eq!(summary.start_readable, "March 19, 2024 at 12:00:00 PM");
        assert_eq!(summary.end_readable, "March 19, 2024 at 01:00:00 PM");
        let expected = (50f64.sqrt() + 200f64.sqrt()) / 2.0;
        assert!((summary.average_speed - expected).abs() < 1e-9);
    }
}
