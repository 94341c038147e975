use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Timelike};
use model::config::Config;
use model::driver::{DriverId, DriverPosition, DriverStatus, NearbyDriver, VehicleType};
use model::error::CoreError;
use model::location::calculate_distance;

use actors::actor::{Actor, SupervisionStrategy};
use actors::handler::Handler;
use utility::clock::Clock;
use utility::geo;

use crate::messages::{
    CalculateDistance, CalculateEta, Decode, DecodeResult, EtaResult, EtaVehicleClass,
    FindNearby, Geohash, RemovePosition, SnapshotSupply, SweepExpired, UpdatePosition,
};

/// Owns every live driver position (§4.1). A handler panic resumes with the
/// position map intact rather than restarting empty — losing every driver's
/// position on one bad message would be worse than the bug that caused it.
pub struct GeoIndexActor {
    positions: HashMap<DriverId, DriverPosition>,
    config: Config,
    clock: Arc<dyn Clock>,
}

impl GeoIndexActor {
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            positions: HashMap::new(),
            config,
            clock,
        }
    }

    /// Geohash prefix length whose cell is at least as wide as `radius_km`,
    /// clamped to what the store actually indexes at (`geohash_precision`).
    fn coarse_precision_for_radius(&self, radius_km: f64) -> usize {
        const LEVELS: [(usize, f64); 8] = [
            (8, 0.038),
            (7, 0.153),
            (6, 1.22),
            (5, 4.89),
            (4, 39.1),
            (3, 156.0),
            (2, 625.0),
            (1, 2500.0),
        ];
        let precision = LEVELS
            .iter()
            .find(|(_, width)| *width >= radius_km)
            .map(|(p, _)| *p)
            .unwrap_or(1);
        precision.min(self.config.geohash_precision).max(1)
    }

    /// Candidate geohash prefixes covering the query's bounding box at the
    /// coarse precision, used to skip exact Haversine for far-away drivers.
    fn candidate_prefixes(&self, lat: f64, lon: f64, radius_km: f64, precision: usize) -> HashSet<String> {
        let mut prefixes = HashSet::new();
        prefixes.insert(geo::encode_geohash(lat, lon, precision));

        let ((min_lat, min_lon), (max_lat, max_lon)) = geo::calculate_bounding_box(lat, lon, radius_km);
        for (corner_lat, corner_lon) in [
            (min_lat, min_lon),
            (min_lat, max_lon),
            (max_lat, min_lon),
            (max_lat, max_lon),
        ] {
            let clamped_lat = corner_lat.clamp(-90.0, 90.0);
            let wrapped_lon = ((corner_lon + 180.0).rem_euclid(360.0)) - 180.0;
            prefixes.insert(geo::encode_geohash(clamped_lat, wrapped_lon, precision));
        }
        prefixes
    }
}

impl Actor for GeoIndexActor {
    fn on_fail(&mut self, error: Box<dyn Any + Send>) -> SupervisionStrategy {
        tracing::error!(?error, "geo index handler panicked, resuming with existing state");
        SupervisionStrategy::Resume
    }
}

#[async_trait]
impl Handler<UpdatePosition> for GeoIndexActor {
    async fn handle(&mut self, msg: UpdatePosition) -> Result<(), CoreError> {
        if !(0.0..=5.0).contains(&msg.rating) {
            return Err(CoreError::invalid_argument(format!(
                "rating {} out of range [0, 5]",
                msg.rating
            )));
        }
        let now = self.clock.now();
        let ttl = Duration::seconds(self.config.position_ttl_s as i64);
        let position = DriverPosition::new(
            msg.driver_id,
            msg.vehicle_id,
            msg.location,
            msg.status,
            msg.vehicle_type,
            msg.rating,
            now,
            ttl,
        );
        self.positions.insert(msg.driver_id, position);
        Ok(())
    }
}

#[async_trait]
impl Handler<RemovePosition> for GeoIndexActor {
    async fn handle(&mut self, msg: RemovePosition) {
        self.positions.remove(&msg.driver_id);
    }
}

#[async_trait]
impl Handler<FindNearby> for GeoIndexActor {
    async fn handle(&mut self, msg: FindNearby) -> Vec<NearbyDriver> {
        if msg.radius_km <= 0.0 {
            return vec![];
        }
        let radius_km = msg.radius_km.min(self.config.max_search_radius_km);
        let radius_m = radius_km * 1000.0;
        let limit = msg
            .limit
            .unwrap_or(self.config.default_search_limit)
            .min(self.config.max_search_limit);

        let precision = self.coarse_precision_for_radius(radius_km);
        let prefixes = self.candidate_prefixes(msg.center.lat, msg.center.lon, radius_km, precision);

        let now = self.clock.now();
        let mut results: Vec<NearbyDriver> = self
            .positions
            .iter()
            .filter(|(_, pos)| !pos.is_expired(now))
            .filter(|(_, pos)| !msg.only_available || pos.status == DriverStatus::Online)
            .filter(|(_, pos)| {
                msg.vehicle_types
                    .as_ref()
                    .map(|types| types.contains(&pos.vehicle_type))
                    .unwrap_or(true)
            })
            .filter(|(_, pos)| {
                let hash = geo::encode_geohash(pos.location.lat, pos.location.lon, precision);
                prefixes.contains(&hash)
            })
            .filter_map(|(driver_id, pos)| {
                let distance_from_center_m = pos.location.haversine_distance_m(&msg.center);
                (distance_from_center_m <= radius_m + 1e-6).then(|| NearbyDriver {
                    driver_id: *driver_id,
                    position: pos.clone(),
                    distance_from_center_m,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            a.distance_from_center_m
                .partial_cmp(&b.distance_from_center_m)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.position
                        .rating
                        .partial_cmp(&a.position.rating)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.driver_id.to_string().cmp(&b.driver_id.to_string()))
        });
        results.truncate(limit);
        results
    }
}

#[async_trait]
impl Handler<CalculateDistance> for GeoIndexActor {
    async fn handle(&mut self, msg: CalculateDistance) -> model::location::DistanceResult {
        calculate_distance(&msg.a, &msg.b, msg.method)
    }
}

fn traffic_multiplier(hour: u32) -> f64 {
    if (7..=9).contains(&hour) || (17..=19).contains(&hour) {
        1.5
    } else if hour >= 23 || hour <= 5 {
        0.8
    } else {
        1.0
    }
}

fn speed_kmh(class: EtaVehicleClass) -> f64 {
    match class {
        EtaVehicleClass::Car => 30.0,
        EtaVehicleClass::Bike => 15.0,
        EtaVehicleClass::Walking => 5.0,
    }
}

#[async_trait]
impl Handler<CalculateEta> for GeoIndexActor {
    async fn handle(&mut self, msg: CalculateEta) -> EtaResult {
        let distance_m = msg.origin.haversine_distance_m(&msg.dest);
        let mut duration_h = (distance_m / 1000.0) / speed_kmh(msg.vehicle_type.into());
        if msg.include_traffic {
            duration_h *= traffic_multiplier(msg.departure_t.hour());
        }
        let duration_s = (duration_h * 3600.0).round() as i64;

        let waypoint_count = self.config.eta_waypoint_count;
        let angular_distance = distance_m / geo::EARTH_RADIUS_M;
        let waypoints = (1..=waypoint_count)
            .map(|i| {
                let fraction = i as f64 / (waypoint_count + 1) as f64;
                geo::interpolate_great_circle(
                    msg.origin.lat,
                    msg.origin.lon,
                    msg.dest.lat,
                    msg.dest.lon,
                    angular_distance,
                    fraction,
                )
            })
            .collect();

        EtaResult {
            duration_s,
            distance_m,
            waypoints,
            eta_at: msg.departure_t + Duration::seconds(duration_s),
        }
    }
}

#[async_trait]
impl Handler<Geohash> for GeoIndexActor {
    async fn handle(&mut self, msg: Geohash) -> Result<String, CoreError> {
        msg.location.geohash(msg.precision)
    }
}

#[async_trait]
impl Handler<Decode> for GeoIndexActor {
    async fn handle(&mut self, msg: Decode) -> Option<DecodeResult> {
        geo::decode_geohash(&msg.geohash).map(|(center, half_extents)| DecodeResult {
            center,
            half_extents,
        })
    }
}

#[async_trait]
impl Handler<SweepExpired> for GeoIndexActor {
    async fn handle(&mut self, _msg: SweepExpired) -> usize {
        let now = self.clock.now();
        let before = self.positions.len();
        self.positions.retain(|_, pos| !pos.is_expired(now));
        before - self.positions.len()
    }
}

#[async_trait]
impl Handler<SnapshotSupply> for GeoIndexActor {
    async fn handle(&mut self, msg: SnapshotSupply) -> Vec<(String, VehicleType, i64)> {
        let now = self.clock.now();
        let mut counts: HashMap<(String, VehicleType), i64> = HashMap::new();
        for pos in self.positions.values() {
            if pos.is_expired(now) || pos.status != DriverStatus::Online {
                continue;
            }
            let zone = geo::encode_geohash(pos.location.lat, pos.location.lon, msg.precision);
            *counts.entry((zone, pos.vehicle_type)).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .map(|((zone, vehicle_type), count)| (zone, vehicle_type, count))
            .collect()
    }
}
