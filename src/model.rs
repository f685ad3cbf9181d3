use serde::{Deserialize, Serialize};

use crate::geocode::GeoLookup;
use crate::geometry::Geodetic;

/// Cartesian position in kilometers (J2000 frame as published by the feed)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Velocity in km/s
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Velocity {
    pub x_dot: f64,
    pub y_dot: f64,
    pub z_dot: f64,
}

/// One orbital sample of the feed, keyed by its epoch.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StateVector {
    /// Day-of-year timestamp, e.g. `2024-079T12:00:00.000Z`
    pub epoch: String,
    pub position: Position,
    pub velocity: Velocity,
}

impl StateVector {
    pub fn new(epoch: impl Into<String>, position: Position, velocity: Velocity) -> Self {
        Self { epoch: epoch.into(), position, velocity }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SpeedReport {
    pub epoch: String,
    pub speed: f64,
}

/// Ground position of one epoch. `place` keeps the geocoder outcome
/// until it is rendered into a report.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub epoch: String,
    pub geodetic: Geodetic,
    pub place: GeoLookup,
}

/// Composite answer for the sample closest to the current time.
#[derive(Debug, Clone, PartialEq)]
pub struct Now {
    pub speed: f64,
    pub location: Location,
}

// --- Response bodies ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LocationReport {
    pub epoch: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub geoposition: String,
}

impl From<Location> for LocationReport {
    fn from(location: Location) -> Self {
        Self {
            geoposition: location.place.display(),
            epoch: location.epoch,
            latitude: location.geodetic.latitude,
            longitude: location.geodetic.longitude,
            altitude: location.geodetic.altitude,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NowReport {
    pub epoch: String,
    pub speed: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub geoposition: String,
}

impl From<Now> for NowReport {
    fn from(now: Now) -> Self {
        let location = LocationReport::from(now.location);
        Self {
            epoch: location.epoch,
            speed: now.speed,
            latitude: location.latitude,
            longitude: location.longitude,
            altitude: location.altitude,
            geoposition: location.geoposition,
        }
    }
}

/// Coverage of the whole dataset
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub start: String,
    pub end: String,
    pub start_readable: String,
    pub end_readable: String,
    pub average_speed: f64,
}
