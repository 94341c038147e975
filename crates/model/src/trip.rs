use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utility::id::{HasId, Id};
use uuid::Uuid;

use crate::driver::{DriverId, VehicleId, VehicleType};
use crate::location::Location;

pub type TripId = Id<Trip>;
pub type RiderId = Id<Rider>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct Rider;
impl HasId for Rider {
    type IdType = Uuid;
}

impl HasId for Trip {
    type IdType = Uuid;
}

/// §4.3 state machine. `Requested` is the sole initial state; `Completed`,
/// `Cancelled` and `Failed` are terminal — no transition is accepted out of
/// them (see [`crate::transitions::is_allowed`] for the full table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Requested,
    Matched,
    DriverAssigned,
    DriverArriving,
    DriverArrived,
    TripStarted,
    InProgress,
    Completed,
    Cancelled,
    Failed,
}

impl TripStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Rider,
    Driver,
    System,
}

/// The authoritative trip projection, reconstructed by replaying
/// [`crate::event::TripEvent`]s (§4.3). Never mutated directly — every
/// field here is set by `apply`.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub trip_id: TripId,
    pub rider_id: RiderId,
    pub driver_id: Option<DriverId>,
    pub vehicle_id: Option<VehicleId>,
    pub vehicle_type: VehicleType,
    pub pickup: Location,
    pub destination: Location,
    pub actual_route: Vec<Location>,
    pub status: TripStatus,
    pub fare_est_cents: Option<i64>,
    pub fare_actual_cents: Option<i64>,
    pub currency: String,
    pub dist_est_km: Option<f64>,
    pub dist_actual_km: Option<f64>,
    pub dur_est_s: Option<i64>,
    pub dur_actual_s: Option<i64>,
    pub requested_at: DateTime<Utc>,
    pub matched_at: Option<DateTime<Utc>>,
    pub driver_assigned_at: Option<DateTime<Utc>>,
    pub driver_arrived_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<CancelledBy>,
    pub cancellation_reason: Option<String>,
    pub passenger_count: u32,
    pub promo_code: Option<String>,
    pub version: u64,
}
