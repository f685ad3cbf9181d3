use serde::{Deserialize, Serialize};

use crate::error::GeometryError;
use crate::model::{Position, Velocity};

/// Mean Earth radius (km). The Earth is treated as a sphere.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Geodetic {
    /// Degrees, [-90, 90]
    pub latitude: f64,
    /// Degrees, (-180, 180]
    pub longitude: f64,
    /// km above the spherical surface
    pub altitude: f64,
}

/// Euclidean norm of the velocity vector (km/s).
#[inline]
pub fn speed(v: &Velocity) -> f64 {
    (v.x_dot * v.x_dot + v.y_dot * v.y_dot + v.z_dot * v.z_dot).sqrt()
}

/// Converts a Cartesian position into latitude/longitude/altitude.
/// A zero (or non-finite) radius has no direction and is rejected.
pub fn geodetic(p: &Position) -> Result<Geodetic, GeometryError> {
    let r = (p.x * p.x + p.y * p.y + p.z * p.z).sqrt();
    if r == 0.0 || !r.is_finite() {
        return Err(GeometryError::Degenerate(r));
    }

    // Clamp guards asin against |z/r| drifting past 1.0 by rounding
    let latitude = (p.z / r).clamp(-1.0, 1.0).asin().to_degrees();
    let mut longitude = p.y.atan2(p.x).to_degrees();
    if longitude == -180.0 {
        longitude = 180.0;
    }

    Ok(Geodetic {
        latitude,
        longitude,
        altitude: r - EARTH_RADIUS_KM,
    })
}
