use chrono::{DateTime, Utc};
use model::driver::VehicleType;
use model::pricing::{FareBreakdown, PricingRule};
use model::promo::PromoCode;

use actors::handler::Message;

/// `estimate`/`finalize` both take pre-computed distance/duration rather
/// than raw locations — the Pricing Engine owns fare math only, distance
/// and ETA math stays exclusively in `geo_index` (§3 ownership rule). The
/// platform facade resolves `origin_zone_geohash` via the Geo Index before
/// calling in.
#[derive(Clone)]
pub struct Estimate {
    pub dist_km: f64,
    pub dur_min: f64,
    pub vehicle_type: VehicleType,
    pub city: Option<String>,
    pub origin_zone_geohash: String,
    pub promo_code: Option<String>,
    pub user_id: Option<String>,
    pub first_ride: bool,
    pub at_t: DateTime<Utc>,
}

impl Message for Estimate {
    type Response = FareBreakdown;
}

#[derive(Clone)]
pub struct Finalize {
    pub actual_distance_km: f64,
    pub actual_duration_min: f64,
    pub vehicle_type: VehicleType,
    pub city: Option<String>,
    pub origin_zone_geohash: String,
    pub promo_code: Option<String>,
    pub user_id: Option<String>,
    pub at_t: DateTime<Utc>,
}

impl Message for Finalize {
    type Response = FareBreakdown;
}

#[derive(Clone)]
pub struct ObserveDemand {
    pub zone_geohash: String,
    pub vehicle_type: VehicleType,
    pub delta: i64,
}

impl Message for ObserveDemand {
    type Response = ();
}

#[derive(Clone)]
pub struct ObserveSupply {
    pub zone_geohash: String,
    pub vehicle_type: VehicleType,
    pub online_count: i64,
}

impl Message for ObserveSupply {
    type Response = ();
}

#[derive(Clone)]
pub struct Surge {
    pub zone_geohash: String,
    pub vehicle_type: VehicleType,
}

impl Message for Surge {
    type Response = f64;
}

/// Recomputes every zone's multiplier from its demand/supply counters and
/// publishes a `pricing_update` for any zone whose multiplier moved by at
/// least 0.1. Driven by the platform's surge `Worker`, ticking once every
/// `surge_recompute_interval_s`.
#[derive(Clone)]
pub struct RecomputeSurge;

impl Message for RecomputeSurge {
    type Response = usize;
}

#[derive(Clone)]
pub struct UpsertPricingRule {
    pub rule: PricingRule,
}

impl Message for UpsertPricingRule {
    type Response = ();
}

#[derive(Clone)]
pub struct UpsertPromoCode {
    pub promo: PromoCode,
}

impl Message for UpsertPromoCode {
    type Response = ();
}

/// Bumps a promo's global `uses` plus its per-user usage count. Called only
/// on trip completion (§4.2 "Usage counter increments only on trip
/// completion"), never at estimate/apply time — an estimated-but-abandoned
/// trip must not burn a use.
#[derive(Clone)]
pub struct RecordPromoUse {
    pub code: String,
    pub user_id: Option<String>,
}

impl Message for RecordPromoUse {
    type Response = ();
}
