use chrono::{DateTime, Utc};
use model::driver::{DriverId, DriverPosition, DriverStatus, NearbyDriver, VehicleId, VehicleType};
use model::error::CoreResult;
use model::location::{DistanceMethod, DistanceResult, Location};

use actors::handler::Message;

#[derive(Clone)]
pub struct UpdatePosition {
    pub driver_id: DriverId,
    pub vehicle_id: VehicleId,
    pub location: Location,
    pub status: DriverStatus,
    pub vehicle_type: VehicleType,
    pub rating: f64,
}

impl Message for UpdatePosition {
    type Response = CoreResult<()>;
}

#[derive(Clone)]
pub struct RemovePosition {
    pub driver_id: DriverId,
}

impl Message for RemovePosition {
    type Response = ();
}

#[derive(Clone)]
pub struct FindNearby {
    pub center: Location,
    pub radius_km: f64,
    pub vehicle_types: Option<Vec<VehicleType>>,
    pub only_available: bool,
    pub limit: Option<usize>,
}

impl Message for FindNearby {
    type Response = Vec<NearbyDriver>;
}

#[derive(Clone)]
pub struct CalculateDistance {
    pub a: Location,
    pub b: Location,
    pub method: DistanceMethod,
}

impl Message for CalculateDistance {
    type Response = DistanceResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtaVehicleClass {
    Car,
    Bike,
    Walking,
}

impl From<VehicleType> for EtaVehicleClass {
    fn from(value: VehicleType) -> Self {
        match value {
            VehicleType::Sedan | VehicleType::Suv | VehicleType::Van => Self::Car,
            VehicleType::Bike => Self::Bike,
            VehicleType::Walking => Self::Walking,
        }
    }
}

#[derive(Clone)]
pub struct CalculateEta {
    pub origin: Location,
    pub dest: Location,
    pub vehicle_type: VehicleType,
    pub departure_t: DateTime<Utc>,
    pub include_traffic: bool,
}

#[derive(Debug, Clone)]
pub struct EtaResult {
    pub duration_s: i64,
    pub distance_m: f64,
    pub waypoints: Vec<(f64, f64)>,
    pub eta_at: DateTime<Utc>,
}

impl Message for CalculateEta {
    type Response = EtaResult;
}

#[derive(Clone)]
pub struct Geohash {
    pub location: Location,
    pub precision: usize,
}

impl Message for Geohash {
    type Response = CoreResult<String>;
}

#[derive(Debug, Clone)]
pub struct DecodeResult {
    pub center: (f64, f64),
    pub half_extents: (f64, f64),
}

#[derive(Clone)]
pub struct Decode {
    pub geohash: String,
}

impl Message for Decode {
    type Response = Option<DecodeResult>;
}

/// Evicts expired driver positions; returns the count removed. Driven by a
/// periodic `Worker` owned by the platform layer rather than scheduled here.
#[derive(Clone)]
pub struct SweepExpired;

impl Message for SweepExpired {
    type Response = usize;
}

/// Online-driver counts per `(zone_geohash, vehicle_type)`, used by the
/// platform's supply-sync `Worker` to keep the pricing engine's supply
/// counters current (§4.2 `observe_supply`, "refreshed from Geo Index").
#[derive(Clone)]
pub struct SnapshotSupply {
    pub precision: usize,
}

impl Message for SnapshotSupply {
    type Response = Vec<(String, VehicleType, i64)>;
}
