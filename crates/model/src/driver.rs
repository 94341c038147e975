use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utility::id::{HasId, Id};
use uuid::Uuid;

use crate::location::Location;

pub type DriverId = Id<DriverPosition>;
pub type VehicleId = Id<Vehicle>;

/// Marker type for vehicle ids; the fleet/vehicle CRUD system itself is an
/// external collaborator (§1), we only ever carry its id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct Vehicle;
impl HasId for Vehicle {
    type IdType = Uuid;
}

impl HasId for DriverPosition {
    type IdType = Uuid;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Offline,
    Online,
    Busy,
    OnBreak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Sedan,
    Suv,
    Van,
    Bike,
    Walking,
}

/// The live position of one driver, owned exclusively by the geo index.
/// Expires `position_ttl_s` after the last update; an expired entry is
/// excluded from every query.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DriverPosition {
    pub driver_id: DriverId,
    pub vehicle_id: VehicleId,
    pub location: Location,
    pub status: DriverStatus,
    pub vehicle_type: VehicleType,
    pub rating: f64,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl DriverPosition {
    pub fn new(
        driver_id: DriverId,
        vehicle_id: VehicleId,
        location: Location,
        status: DriverStatus,
        vehicle_type: VehicleType,
        rating: f64,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            driver_id,
            vehicle_id,
            location,
            status,
            vehicle_type,
            rating,
            updated_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A driver candidate returned by `find_nearby`, paired with its distance
/// from the query center.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NearbyDriver {
    pub driver_id: DriverId,
    pub position: DriverPosition,
    pub distance_from_center_m: f64,
}
