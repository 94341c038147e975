use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use model::driver::{DriverId, DriverStatus, NearbyDriver, VehicleId, VehicleType};
use model::location::Location;
use serde::Deserialize;
use utility::id::Id;
use uuid::Uuid;

use crate::{
    common::{RouteResult, VecResponse},
    WebState,
};

pub(crate) fn routes(state: WebState) -> Router {
    Router::new()
        .route("/:id/position", post(update_position))
        .route("/nearby", get(find_nearby))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePositionBody {
    vehicle_id: Uuid,
    location: Location,
    status: DriverStatus,
    vehicle_type: VehicleType,
    rating: f64,
}

async fn update_position(
    State(WebState { platform }): State<WebState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdatePositionBody>,
) -> RouteResult<()> {
    let driver_id: DriverId = Id::new(id);
    let vehicle_id: VehicleId = Id::new(body.vehicle_id);
    platform
        .update_driver_position(driver_id, vehicle_id, body.location, body.status, body.vehicle_type, body.rating)
        .await?;
    Ok(Json(()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NearbyQuery {
    lat: f64,
    lon: f64,
    accuracy_m: f64,
    radius_km: f64,
    vehicle_types: Option<String>,
    only_available: Option<bool>,
    limit: Option<usize>,
}

async fn find_nearby(
    State(WebState { platform }): State<WebState>,
    Query(params): Query<NearbyQuery>,
) -> RouteResult<VecResponse<NearbyDriver>> {
    let center = Location::new(params.lat, params.lon, params.accuracy_m, chrono::Utc::now())?;
    let vehicle_types = params
        .vehicle_types
        .map(|csv| csv.split(',').filter_map(parse_vehicle_type).collect::<Vec<_>>());
    let drivers = platform
        .find_nearby_drivers(center, params.radius_km, vehicle_types, params.only_available.unwrap_or(false), params.limit)
        .await?;
    Ok(VecResponse::non_paginated(drivers).json())
}

fn parse_vehicle_type(raw: &str) -> Option<VehicleType> {
    match raw.trim() {
        "sedan" => Some(VehicleType::Sedan),
        "suv" => Some(VehicleType::Suv),
        "van" => Some(VehicleType::Van),
        "bike" => Some(VehicleType::Bike),
        "walking" => Some(VehicleType::Walking),
        _ => None,
    }
}
