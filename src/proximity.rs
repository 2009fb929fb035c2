use crate::geo::Coordinate;
use crate::poi::Poi;

/// Radius within which a POI counts as arrived at, in meters.
pub const DEFAULT_PROXIMITY_RADIUS_M: f64 = 50.0;

/// A POI inside the proximity radius together with its distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nearby<'a> {
    pub poi: &'a Poi,
    pub distance_m: f64,
}

/// Find the single closest POI strictly within `radius_m` of `location`.
///
/// Ties resolve to the earliest POI in `pois`. Without a location there is
/// never a nearby POI.
pub fn detect_nearest<'a>(
    location: Option<&Coordinate>,
    pois: &'a [Poi],
    radius_m: f64,
) -> Option<Nearby<'a>> {
    let location = location?;

    let mut closest: Option<Nearby<'a>> = None;
    for poi in pois {
        let distance_m = location.distance_to(poi.latitude, poi.longitude);
        if distance_m >= radius_m {
            continue;
        }
        if closest.map_or(true, |c| distance_m < c.distance_m) {
            closest = Some(Nearby { poi, distance_m });
        }
    }
    closest
}

/// Remembers the current nearby POI between evaluations.
#[derive(Debug, Clone)]
pub struct ProximityDetector {
    radius_m: f64,
    nearby: Option<String>,
}

impl Default for ProximityDetector {
    fn default() -> Self {
        Self::new(DEFAULT_PROXIMITY_RADIUS_M)
    }
}

impl ProximityDetector {
    pub fn new(radius_m: f64) -> Self {
        Self {
            radius_m,
            nearby: None,
        }
    }

    /// Re-evaluate against a new location or POI set.
    pub fn update<'a>(&mut self, location: Option<&Coordinate>, pois: &'a [Poi]) -> Option<&'a Poi> {
        let nearest = detect_nearest(location, pois, self.radius_m);
        let id = nearest.map(|n| n.poi.id.clone());
        if id != self.nearby {
            match &nearest {
                Some(n) => log::debug!("Nearest POI is now '{}' at {:.1} m", n.poi.id, n.distance_m),
                None => log::debug!("No POI within {} m", self.radius_m),
            }
            self.nearby = id;
        }
        nearest.map(|n| n.poi)
    }

    /// Id of the POI found by the last `update`.
    pub fn nearby_id(&self) -> Option<&str> {
        self.nearby.as_deref()
    }
}
