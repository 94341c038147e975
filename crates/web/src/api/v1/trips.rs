use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use model::driver::{DriverId, VehicleType};
use model::location::Location;
use model::trip::{CancelledBy, RiderId, Trip, TripId, TripStatus};
use serde::Deserialize;
use utility::id::Id;
use uuid::Uuid;

use crate::{common::RouteResult, WebState};

pub(crate) fn routes(state: WebState) -> Router {
    Router::new()
        .route("/", post(request_trip))
        .route("/:id", get(get_trip))
        .route("/:id/cancel", post(cancel_trip))
        .route("/:id/accept", post(accept_offer))
        .route("/:id/reject", post(reject_offer))
        .route("/:id/status", post(change_status))
        .route("/:id/start", post(start_trip))
        .route("/:id/complete", post(complete_trip))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestTripBody {
    rider_id: Uuid,
    pickup: Location,
    destination: Location,
    vehicle_type: VehicleType,
    passenger_count: u32,
    promo_code: Option<String>,
}

async fn request_trip(
    State(WebState { platform }): State<WebState>,
    Json(body): Json<RequestTripBody>,
) -> RouteResult<Trip> {
    let rider_id: RiderId = Id::new(body.rider_id);
    let trip = platform
        .request_trip(
            rider_id,
            body.pickup,
            body.destination,
            body.vehicle_type,
            body.passenger_count,
            body.promo_code,
        )
        .await?;
    Ok(Json(trip))
}

async fn get_trip(State(WebState { platform }): State<WebState>, Path(id): Path<Uuid>) -> RouteResult<Trip> {
    let trip_id: TripId = Id::new(id);
    let trip = platform.get_trip(trip_id).await?;
    Ok(Json(trip))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelTripBody {
    cancelled_by: CancelledBy,
    reason: Option<String>,
}

async fn cancel_trip(
    State(WebState { platform }): State<WebState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CancelTripBody>,
) -> RouteResult<Trip> {
    let trip_id: TripId = Id::new(id);
    let trip = platform.cancel_trip(trip_id, body.cancelled_by, body.reason).await?;
    Ok(Json(trip))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfferBody {
    driver_id: Uuid,
}

async fn accept_offer(
    State(WebState { platform }): State<WebState>,
    Path(id): Path<Uuid>,
    Json(body): Json<OfferBody>,
) -> RouteResult<()> {
    let trip_id: TripId = Id::new(id);
    let driver_id: DriverId = Id::new(body.driver_id);
    platform.accept_offer(trip_id, driver_id).await?;
    Ok(Json(()))
}

async fn reject_offer(
    State(WebState { platform }): State<WebState>,
    Path(id): Path<Uuid>,
    Json(body): Json<OfferBody>,
) -> RouteResult<()> {
    let trip_id: TripId = Id::new(id);
    let driver_id: DriverId = Id::new(body.driver_id);
    platform.reject_offer(trip_id, driver_id).await?;
    Ok(Json(()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeStatusBody {
    new_status: TripStatus,
}

/// Driver-app progression through `DriverAssigned -> DriverArriving ->
/// DriverArrived -> InProgress` — any `status_changed` transition that
/// doesn't carry its own payload (see `ChangeStatus` in `trip_ledger`).
async fn change_status(
    State(WebState { platform }): State<WebState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ChangeStatusBody>,
) -> RouteResult<Trip> {
    let trip_id: TripId = Id::new(id);
    let trip = platform.change_trip_status(trip_id, body.new_status).await?;
    Ok(Json(trip))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartTripBody {
    start_location: Location,
}

async fn start_trip(
    State(WebState { platform }): State<WebState>,
    Path(id): Path<Uuid>,
    Json(body): Json<StartTripBody>,
) -> RouteResult<Trip> {
    let trip_id: TripId = Id::new(id);
    let trip = platform.start_trip(trip_id, body.start_location).await?;
    Ok(Json(trip))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompleteTripBody {
    end_location: Location,
    fare_actual_cents: Option<i64>,
}

async fn complete_trip(
    State(WebState { platform }): State<WebState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CompleteTripBody>,
) -> RouteResult<Trip> {
    let trip_id: TripId = Id::new(id);
    let trip = platform.complete_trip(trip_id, body.end_location, body.fare_actual_cents).await?;
    Ok(Json(trip))
}
