use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utility::id::{HasId, Id};
use uuid::Uuid;

use crate::driver::{DriverId, DriverPosition, DriverStatus, VehicleId, VehicleType};
use crate::trip::{TripId, TripStatus};

pub type SubscriptionId = Id<SubscriptionMarker>;
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct SubscriptionMarker;
impl HasId for SubscriptionMarker {
    type IdType = Uuid;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    DriverLocations,
    TripUpdates,
    PricingUpdates,
}

/// Per-topic filter predicate (§4.5). Each field defaults to "don't filter
/// on this", so an empty filter passes everything on that topic.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DriverLocationsFilter {
    pub area_geohash_prefix: Option<String>,
    pub driver_ids: Option<Vec<DriverId>>,
}

impl DriverLocationsFilter {
    pub fn matches(&self, event: &DriverLocationEvent) -> bool {
        let prefix_ok = self
            .area_geohash_prefix
            .as_ref()
            .map(|prefix| event.zone_geohash.starts_with(prefix.as_str()))
            .unwrap_or(false);
        let id_ok = self
            .driver_ids
            .as_ref()
            .map(|ids| ids.contains(&event.driver_id))
            .unwrap_or(false);

        if self.area_geohash_prefix.is_none() && self.driver_ids.is_none() {
            return true;
        }
        prefix_ok || id_ok
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TripUpdatesFilter {
    pub trip_ids: Option<Vec<TripId>>,
    pub user_ids: Option<Vec<String>>,
}

impl TripUpdatesFilter {
    pub fn matches(&self, event: &TripUpdateEvent) -> bool {
        let trip_ok = self
            .trip_ids
            .as_ref()
            .map(|ids| ids.contains(&event.trip_id))
            .unwrap_or(false);
        let user_ok = self
            .user_ids
            .as_ref()
            .zip(event.user_id.as_ref())
            .map(|(ids, uid)| ids.iter().any(|id| id == uid))
            .unwrap_or(false);

        if self.trip_ids.is_none() && self.user_ids.is_none() {
            return true;
        }
        trip_ok || user_ok
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PricingUpdatesFilter {
    pub area_geohash_prefix: Option<String>,
    pub vehicle_types: Option<Vec<VehicleType>>,
}

impl PricingUpdatesFilter {
    pub fn matches(&self, event: &PricingUpdateEvent) -> bool {
        let prefix_ok = self
            .area_geohash_prefix
            .as_ref()
            .map(|prefix| event.zone_geohash.starts_with(prefix.as_str()))
            .unwrap_or(true);
        let vehicle_ok = self
            .vehicle_types
            .as_ref()
            .map(|types| types.contains(&event.vehicle_type))
            .unwrap_or(true);
        prefix_ok && vehicle_ok
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "topic", rename_all = "snake_case")]
pub enum Filter {
    DriverLocations(DriverLocationsFilter),
    TripUpdates(TripUpdatesFilter),
    PricingUpdates(PricingUpdatesFilter),
}

impl Filter {
    pub fn topic(&self) -> Topic {
        match self {
            Self::DriverLocations(_) => Topic::DriverLocations,
            Self::TripUpdates(_) => Topic::TripUpdates,
            Self::PricingUpdates(_) => Topic::PricingUpdates,
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DriverLocationEvent {
    pub driver_id: DriverId,
    pub vehicle_id: VehicleId,
    pub zone_geohash: String,
    pub location_lat: f64,
    pub location_lon: f64,
    pub status: DriverStatus,
    pub speed_kmh: Option<f64>,
    pub heading: Option<f64>,
    pub t: DateTime<Utc>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TripUpdateEvent {
    pub trip_id: TripId,
    pub old_status: Option<TripStatus>,
    pub new_status: TripStatus,
    pub user_id: Option<String>,
    pub location_lat: Option<f64>,
    pub location_lon: Option<f64>,
    pub eta_s: Option<i64>,
    pub t: DateTime<Utc>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PricingUpdateEvent {
    pub zone_geohash: String,
    pub vehicle_type: VehicleType,
    pub multiplier: f64,
    pub reason: Option<String>,
    pub t: DateTime<Utc>,
}

/// A streamed item: either a domain event or a synthetic heartbeat/closing
/// signal (§4.5, §5).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamItem {
    DriverLocation(DriverLocationEvent),
    TripUpdate(TripUpdateEvent),
    PricingUpdate(PricingUpdateEvent),
    Heartbeat { t: DateTime<Utc> },
    Closing,
}
