use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the spherical approximation, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A single position fix reported by the location source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in meters, when the source reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    /// Great-circle distance from this fix to the given point, in meters.
    pub fn distance_to(&self, latitude: f64, longitude: f64) -> f64 {
        distance(self.latitude, self.longitude, latitude, longitude)
    }
}

/// Great-circle distance in meters between two points given in degrees.
///
/// Uses the haversine formula on a sphere of radius [`EARTH_RADIUS_M`].
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push `a` marginally past 1 for antipodal points.
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}
