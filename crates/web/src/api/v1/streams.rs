use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{delete, get},
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures::stream::Stream;
use model::driver::{DriverId, VehicleType};
use model::subscription::SubscriptionId;
use model::trip::TripId;
use serde::Deserialize;
use utility::id::Id;
use uuid::Uuid;

/// Query clients pass `deadline_s` (seconds from now), not a timestamp, since
/// the caller's clock may not agree with the server's (§4.5 subscription
/// deadlines).
fn resolve_deadline(deadline_s: Option<i64>) -> Option<DateTime<Utc>> {
    deadline_s.map(|secs| Utc::now() + chrono::Duration::seconds(secs))
}

use crate::{
    common::{RouteErrorResponse, RouteResult},
    WebState,
};

pub(crate) fn routes(state: WebState) -> Router {
    Router::new()
        .route("/driver-locations", get(driver_locations))
        .route("/trip-updates", get(trip_updates))
        .route("/pricing-updates", get(pricing_updates))
        .route("/:id", delete(unsubscribe))
        .with_state(state)
}

type SseBody = Sse<std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>>;

fn csv_uuids(csv: Option<String>) -> Option<Vec<Uuid>> {
    csv.map(|s| s.split(',').filter_map(|id| id.trim().parse().ok()).collect())
}

fn csv_strings(csv: Option<String>) -> Option<Vec<String>> {
    csv.map(|s| s.split(',').map(|id| id.trim().to_string()).collect())
}

fn csv_vehicle_types(csv: Option<String>) -> Option<Vec<VehicleType>> {
    csv.map(|s| {
        s.split(',')
            .filter_map(|raw| match raw.trim() {
                "sedan" => Some(VehicleType::Sedan),
                "suv" => Some(VehicleType::Suv),
                "van" => Some(VehicleType::Van),
                "bike" => Some(VehicleType::Bike),
                "walking" => Some(VehicleType::Walking),
                _ => None,
            })
            .collect()
    })
}

/// Announces the `subscription_id` as the body's first event (the client
/// needs it for `DELETE /streams/:id`), then forwards every queued item
/// until the subscription's queue is closed (§4.5 shutdown/slow-consumer
/// termination).
fn tagged_body(subscription_id: SubscriptionId, receiver: stream_bus::QueueReceiver) -> SseBody {
    let announce = futures::stream::once(async move {
        Ok(Event::default()
            .event("subscription")
            .json_data(serde_json::json!({ "subscriptionId": subscription_id }))
            .unwrap_or_default())
    });
    let items = futures::stream::unfold(receiver, |mut rx| async move {
        let item = rx.recv().await?;
        Some((Ok(Event::default().json_data(item).unwrap_or_default()), rx))
    });
    Sse::new(Box::pin(announce.chain(items)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriverLocationsQuery {
    area_geohash_prefix: Option<String>,
    driver_ids: Option<String>,
    deadline_s: Option<i64>,
}

async fn driver_locations(
    State(WebState { platform }): State<WebState>,
    Query(params): Query<DriverLocationsQuery>,
) -> Result<SseBody, RouteErrorResponse> {
    let driver_ids: Option<Vec<DriverId>> = csv_uuids(params.driver_ids).map(|ids| ids.into_iter().map(Id::new).collect());
    let deadline = resolve_deadline(params.deadline_s);
    let (subscription_id, receiver) = platform.subscribe_driver_locations(params.area_geohash_prefix, driver_ids, deadline).await?;
    Ok(tagged_body(subscription_id, receiver).keep_alive(KeepAlive::default()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TripUpdatesQuery {
    trip_ids: Option<String>,
    user_ids: Option<String>,
    deadline_s: Option<i64>,
}

async fn trip_updates(
    State(WebState { platform }): State<WebState>,
    Query(params): Query<TripUpdatesQuery>,
) -> Result<SseBody, RouteErrorResponse> {
    let trip_ids: Option<Vec<TripId>> = csv_uuids(params.trip_ids).map(|ids| ids.into_iter().map(Id::new).collect());
    let user_ids = csv_strings(params.user_ids);
    let deadline = resolve_deadline(params.deadline_s);
    let (subscription_id, receiver) = platform.subscribe_trip_updates(trip_ids, user_ids, deadline).await?;
    Ok(tagged_body(subscription_id, receiver).keep_alive(KeepAlive::default()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PricingUpdatesQuery {
    area_geohash_prefix: Option<String>,
    vehicle_types: Option<String>,
    deadline_s: Option<i64>,
}

async fn pricing_updates(
    State(WebState { platform }): State<WebState>,
    Query(params): Query<PricingUpdatesQuery>,
) -> Result<SseBody, RouteErrorResponse> {
    let vehicle_types = csv_vehicle_types(params.vehicle_types);
    let deadline = resolve_deadline(params.deadline_s);
    let (subscription_id, receiver) = platform.subscribe_pricing_updates(params.area_geohash_prefix, vehicle_types, deadline).await?;
    Ok(tagged_body(subscription_id, receiver).keep_alive(KeepAlive::default()))
}

async fn unsubscribe(State(WebState { platform }): State<WebState>, Path(id): Path<Uuid>) -> RouteResult<()> {
    let subscription_id: SubscriptionId = Id::new(id);
    platform.unsubscribe(subscription_id).await?;
    Ok(Json(()))
}
