use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use utility::geo;

/// A single point fix: latitude/longitude, the accuracy of the fix and when
/// it was taken. `-90<=lat<=90`, `-180<=lon<=180` is enforced by
/// [`Location::new`], never by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    pub accuracy_m: f64,
    pub t: DateTime<Utc>,
}

impl Location {
    pub fn new(lat: f64, lon: f64, accuracy_m: f64, t: DateTime<Utc>) -> Result<Self, CoreError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoreError::invalid_argument(format!(
                "latitude {lat} out of range [-90, 90]"
            )));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(CoreError::invalid_argument(format!(
                "longitude {lon} out of range [-180, 180]"
            )));
        }
        Ok(Self {
            lat,
            lon,
            accuracy_m,
            t,
        })
    }

    pub fn haversine_distance_m(&self, other: &Location) -> f64 {
        geo::haversine_distance_m(self.lat, self.lon, other.lat, other.lon)
    }

    pub fn bearing_to(&self, other: &Location) -> f64 {
        geo::initial_bearing(self.lat, self.lon, other.lat, other.lon)
    }

    pub fn midpoint(&self, other: &Location) -> (f64, f64) {
        geo::midpoint(self.lat, self.lon, other.lat, other.lon)
    }

    pub fn geohash(&self, precision: usize) -> Result<String, CoreError> {
        if !(1..=12).contains(&precision) {
            return Err(CoreError::invalid_argument(format!(
                "geohash precision {precision} out of range [1, 12]"
            )));
        }
        Ok(geo::encode_geohash(self.lat, self.lon, precision))
    }
}

/// Distance calculation method requested by `CalculateDistance` (§4.1, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMethod {
    Haversine,
    Manhattan,
    Euclidean,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DistanceResult {
    pub distance_m: f64,
    pub bearing_deg: f64,
    pub method: DistanceMethod,
}

pub fn calculate_distance(a: &Location, b: &Location, method: DistanceMethod) -> DistanceResult {
    let distance_m = match method {
        DistanceMethod::Haversine => geo::haversine_distance_m(a.lat, a.lon, b.lat, b.lon),
        DistanceMethod::Manhattan => geo::manhattan_distance_m(a.lat, a.lon, b.lat, b.lon),
        DistanceMethod::Euclidean => geo::euclidean_distance_m(a.lat, a.lon, b.lat, b.lon),
    };
    DistanceResult {
        distance_m,
        bearing_deg: a.bearing_to(b),
        method,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(lat: f64, lon: f64) -> Location {
        Location::new(lat, lon, 5.0, Utc::now()).unwrap()
    }

    #[test]
    fn rejects_out_of_range_latitude() {
        assert!(Location::new(91.0, 0.0, 5.0, Utc::now()).is_err());
    }

    #[test]
    fn rejects_out_of_range_longitude() {
        assert!(Location::new(0.0, 181.0, 5.0, Utc::now()).is_err());
    }

    #[test]
    fn geohash_rejects_bad_precision() {
        let l = loc(40.0, -74.0);
        assert!(l.geohash(0).is_err());
        assert!(l.geohash(13).is_err());
        assert!(l.geohash(1).is_ok());
        assert!(l.geohash(12).is_ok());
    }

    #[test]
    fn manhattan_is_at_least_haversine() {
        let a = loc(40.0, -74.0);
        let b = loc(40.1, -73.9);
        let haversine = a.haversine_distance_m(&b);
        let manhattan = geo::manhattan_distance_m(a.lat, a.lon, b.lat, b.lon);
        assert!(manhattan >= haversine - 1.0);
    }
}
