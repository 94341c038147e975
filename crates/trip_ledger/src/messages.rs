use model::driver::{DriverId, VehicleId, VehicleType};
use model::error::CoreResult;
use model::event::TripEvent;
use model::location::Location;
use model::trip::{CancelledBy, RiderId, Trip, TripId};
use serde_json::Value;

use actors::handler::Message;

/// Creates a new trip (§4.3: `trip_requested`). Always an append at
/// `expected_version = 0` against a fresh `trip_id`.
#[derive(Clone)]
pub struct RequestTrip {
    pub rider_id: RiderId,
    pub pickup: Location,
    pub destination: Location,
    pub vehicle_type: VehicleType,
    pub passenger_count: u32,
    pub promo_code: Option<String>,
    pub user_id: Option<String>,
}

impl Message for RequestTrip {
    type Response = CoreResult<Trip>;
}

/// Transitions `Requested -> Matched -> DriverAssigned` in one atomic event
/// batch (§4.4 step 5).
#[derive(Clone)]
pub struct AssignDriver {
    pub trip_id: TripId,
    pub driver_id: DriverId,
    pub vehicle_id: VehicleId,
    pub user_id: Option<String>,
}

impl Message for AssignDriver {
    type Response = CoreResult<Trip>;
}

/// A generic `status_changed` transition: `DriverAssigned -> DriverArriving`,
/// `DriverAssigned|DriverArriving -> DriverArrived`, `TripStarted ->
/// InProgress`. Anything requiring its own payload (start/complete/cancel)
/// goes through its dedicated message instead.
#[derive(Clone)]
pub struct ChangeStatus {
    pub trip_id: TripId,
    pub new_status: model::trip::TripStatus,
    pub user_id: Option<String>,
}

impl Message for ChangeStatus {
    type Response = CoreResult<Trip>;
}

#[derive(Clone)]
pub struct StartTrip {
    pub trip_id: TripId,
    pub start_location: Location,
    pub user_id: Option<String>,
}

impl Message for StartTrip {
    type Response = CoreResult<Trip>;
}

#[derive(Clone)]
pub struct CompleteTrip {
    pub trip_id: TripId,
    pub end_location: Location,
    pub fare_actual_cents: Option<i64>,
    pub user_id: Option<String>,
}

impl Message for CompleteTrip {
    type Response = CoreResult<Trip>;
}

/// Cancellation is valid from any non-terminal state and idempotent from a
/// state that's already `Cancelled` — repeated calls never append a second
/// `trip_cancelled` event (§8).
#[derive(Clone)]
pub struct CancelTrip {
    pub trip_id: TripId,
    pub cancelled_by: CancelledBy,
    pub reason: Option<String>,
    pub user_id: Option<String>,
}

impl Message for CancelTrip {
    type Response = CoreResult<Trip>;
}

/// The dispatcher's own terminal transition when a request exhausts every
/// attempt without securing a driver (§4.4 step 1, reason `no_drivers`).
#[derive(Clone)]
pub struct FailTrip {
    pub trip_id: TripId,
    pub reason: String,
}

impl Message for FailTrip {
    type Response = CoreResult<Trip>;
}

/// The low-level event-log contract (§4.3): appends `events` iff the
/// current max version equals `expected_version`, else
/// `concurrency_conflict`. Exposed directly for tests of the log itself and
/// for replay/retry call sites; every higher-level message above is built
/// on top of it.
#[derive(Clone)]
pub struct Append {
    pub trip_id: TripId,
    pub events: Vec<AppendPayload>,
    pub expected_version: u64,
}

#[derive(Clone)]
pub struct AppendPayload {
    pub payload: model::event::TripEventPayload,
    pub user_id: Option<String>,
    pub metadata: Value,
}

impl Message for Append {
    type Response = CoreResult<Vec<TripEvent>>;
}

#[derive(Clone)]
pub struct Load {
    pub trip_id: TripId,
}

impl Message for Load {
    type Response = CoreResult<Vec<TripEvent>>;
}

#[derive(Clone)]
pub struct Rebuild {
    pub trip_id: TripId,
}

impl Message for Rebuild {
    type Response = CoreResult<Trip>;
}

/// Diagnostic accessor used by tests asserting the snapshot cache never
/// changes `rebuild`'s result.
#[derive(Clone)]
pub struct DropSnapshots;

impl Message for DropSnapshots {
    type Response = ();
}
