use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use uuid::Uuid;

use crate::driver::{DriverId, VehicleId, VehicleType};
use crate::location::Location;
use crate::trip::{CancelledBy, RiderId, TripId, TripStatus};

/// One append-only fact about a trip. `version` is assigned by the event
/// log on append (monotonically increasing per `trip_id`, no gaps) — never
/// set by the caller ahead of time.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TripEvent {
    pub event_id: Uuid,
    pub trip_id: TripId,
    pub version: u64,
    pub payload: TripEventPayload,
    pub user_id: Option<String>,
    pub t: DateTime<Utc>,
    pub metadata: Value,
}

/// The known event payloads (§4.3). `Unknown` preserves forward
/// compatibility: a payload this build doesn't recognize deserializes into
/// it and is skipped — never alters state, per the replay contract — while
/// still round-tripping so it isn't silently lost in storage.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TripEventPayload {
    TripRequested {
        rider_id: RiderId,
        pickup: Location,
        destination: Location,
        vehicle_type: VehicleType,
        passenger_count: u32,
        promo_code: Option<String>,
    },
    DriverAssigned {
        driver_id: DriverId,
        vehicle_id: VehicleId,
        t: DateTime<Utc>,
    },
    StatusChanged {
        old: TripStatus,
        new: TripStatus,
        t: DateTime<Utc>,
    },
    TripStarted {
        start_location: Location,
        t: DateTime<Utc>,
    },
    TripCompleted {
        end_location: Location,
        final_fare_cents: Option<i64>,
        t: DateTime<Utc>,
    },
    TripCancelled {
        cancelled_by: CancelledBy,
        reason: Option<String>,
        t: DateTime<Utc>,
    },
    #[serde(other)]
    Unknown,
}

impl TripEventPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TripRequested { .. } => "trip_requested",
            Self::DriverAssigned { .. } => "driver_assigned",
            Self::StatusChanged { .. } => "status_changed",
            Self::TripStarted { .. } => "trip_started",
            Self::TripCompleted { .. } => "trip_completed",
            Self::TripCancelled { .. } => "trip_cancelled",
            Self::Unknown => "unknown",
        }
    }
}
