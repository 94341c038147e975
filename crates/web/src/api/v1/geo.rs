use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use geo_index::{DecodeResult, EtaResult};
use model::driver::VehicleType;
use model::location::{DistanceMethod, DistanceResult, Location};
use serde::Deserialize;

use crate::{common::RouteResult, WebState};

pub(crate) fn routes(state: WebState) -> Router {
    Router::new()
        .route("/distance", post(calculate_distance))
        .route("/eta", post(calculate_eta))
        .route("/geohash", get(geohash))
        .route("/geohash/decode", get(decode_geohash))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DistanceBody {
    origin: Location,
    dest: Location,
    method: DistanceMethod,
}

async fn calculate_distance(
    State(WebState { platform }): State<WebState>,
    Json(body): Json<DistanceBody>,
) -> RouteResult<DistanceResult> {
    let result = platform.calculate_distance(body.origin, body.dest, body.method).await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EtaBody {
    origin: Location,
    dest: Location,
    vehicle_type: VehicleType,
    departure_t: DateTime<Utc>,
    include_traffic: bool,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct EtaDto {
    duration_s: i64,
    distance_m: f64,
    waypoints: Vec<(f64, f64)>,
    eta_at: DateTime<Utc>,
}

impl From<EtaResult> for EtaDto {
    fn from(value: EtaResult) -> Self {
        Self {
            duration_s: value.duration_s,
            distance_m: value.distance_m,
            waypoints: value.waypoints,
            eta_at: value.eta_at,
        }
    }
}

async fn calculate_eta(State(WebState { platform }): State<WebState>, Json(body): Json<EtaBody>) -> RouteResult<EtaDto> {
    let result = platform
        .calculate_eta(body.origin, body.dest, body.vehicle_type, body.departure_t, body.include_traffic)
        .await?;
    Ok(Json(result.into()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeohashQuery {
    lat: f64,
    lon: f64,
    accuracy_m: f64,
    precision: usize,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct GeohashDto {
    geohash: String,
}

async fn geohash(State(WebState { platform }): State<WebState>, Query(params): Query<GeohashQuery>) -> RouteResult<GeohashDto> {
    let location = Location::new(params.lat, params.lon, params.accuracy_m, Utc::now())?;
    let geohash = platform.geohash(location, params.precision).await?;
    Ok(Json(GeohashDto { geohash }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecodeQuery {
    geohash: String,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct DecodeDto {
    center: (f64, f64),
    half_extents: (f64, f64),
}

impl From<DecodeResult> for DecodeDto {
    fn from(value: DecodeResult) -> Self {
        Self {
            center: value.center,
            half_extents: value.half_extents,
        }
    }
}

async fn decode_geohash(
    State(WebState { platform }): State<WebState>,
    Query(params): Query<DecodeQuery>,
) -> RouteResult<Option<DecodeDto>> {
    let decoded = platform.decode_geohash(params.geohash).await?;
    Ok(Json(decoded.map(DecodeDto::from)))
}
