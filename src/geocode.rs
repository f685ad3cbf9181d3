//! Best-effort reverse geocoding of ground positions.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/reverse";

pub const NO_PLACE_TEXT: &str = "Over water or uninhabited area";
pub const UNAVAILABLE_TEXT: &str = "Location data unavailable";

/// Outcome of one reverse lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum GeoLookup {
    Found(String),
    /// The service answered but knows no place there
    NotFound,
    /// Transport, status or decoding failure
    Unavailable(String),
}

impl GeoLookup {
    pub fn display(&self) -> String {
        match self {
            GeoLookup::Found(name) => name.clone(),
            GeoLookup::NotFound => NO_PLACE_TEXT.to_string(),
            GeoLookup::Unavailable(_) => UNAVAILABLE_TEXT.to_string(),
        }
    }
}

pub trait Geocoder: Send + Sync {
    /// Never fails: errors are folded into [`GeoLookup::Unavailable`].
    fn reverse(&self, latitude: f64, longitude: f64) -> impl Future<Output = GeoLookup> + Send;
}

#[derive(Debug, Deserialize)]
struct NominatimReply {
    display_name: Option<String>,
    error: Option<String>,
}

/// Nominatim `/reverse` client, country-level zoom, English names.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    url: String,
}

impl NominatimGeocoder {
    pub fn new(url: &str, timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client, url: url.to_string() })
    }

    async fn lookup(&self, latitude: f64, longitude: f64) -> Result<NominatimReply, reqwest::Error> {
        self.client
            .get(&self.url)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("zoom", "4".to_string()),
                ("accept-language", "en".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<NominatimReply>()
            .await
    }
}

impl Geocoder for NominatimGeocoder {
    async fn reverse(&self, latitude: f64, longitude: f64) -> GeoLookup {
        match self.lookup(latitude, longitude).await {
            Ok(NominatimReply { display_name: Some(name), .. }) => GeoLookup::Found(name),
            Ok(NominatimReply { error, .. }) => {
                if let Some(reason) = error {
                    debug!(latitude, longitude, "no place: {}", reason);
                }
                GeoLookup::NotFound
            }
            Err(e) => {
                warn!(latitude, longitude, "geocoding error: {}", e);
                GeoLookup::Unavailable(e.to_string())
            }
        }
    }
}
