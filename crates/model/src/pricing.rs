use std::collections::HashMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utility::id::{HasId, Id};
use uuid::Uuid;

use crate::driver::VehicleType;

pub type PricingRuleId = Id<PricingRule>;
impl HasId for PricingRule {
    type IdType = Uuid;
}

/// A fare formula for one `(vehicle_type, city)` pair (§3, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PricingRule {
    pub id: PricingRuleId,
    pub vehicle_type: VehicleType,
    pub city: Option<String>,
    pub base_cents: i64,
    pub per_km_cents: i64,
    pub per_min_cents: i64,
    pub booking_fee_cents: i64,
    pub service_fee_cents: i64,
    /// keyed by hour-of-day, 0..=23
    pub time_multipliers: HashMap<u8, f64>,
    /// keyed by `chrono::Weekday::num_days_from_monday()`, 0..=6
    pub day_multipliers: HashMap<u8, f64>,
    pub min_cents: Option<i64>,
    pub max_cents: Option<i64>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub active: bool,
}

impl PricingRule {
    pub fn time_multiplier_at(&self, hour: u32) -> f64 {
        self.time_multipliers
            .get(&(hour as u8))
            .copied()
            .unwrap_or(1.0)
    }

    pub fn day_multiplier_at(&self, weekday_from_monday: u8) -> f64 {
        self.day_multipliers
            .get(&weekday_from_monday)
            .copied()
            .unwrap_or(1.0)
    }

    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        self.active
            && self.valid_from <= at
            && self.valid_until.map(|until| at < until).unwrap_or(true)
    }
}

/// Keyed by `(zone_geohash, vehicle_type)`; one live entry per key (§3).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SurgeZone {
    pub zone_geohash: String,
    pub vehicle_type: VehicleType,
    pub multiplier: f64,
    pub demand_count: i64,
    pub supply_count: i64,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub reason: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FareBreakdown {
    pub base_cents: i64,
    pub distance_cents: i64,
    pub duration_cents: i64,
    pub booking_fee_cents: i64,
    pub service_fee_cents: i64,
    pub time_multiplier: f64,
    pub day_multiplier: f64,
    pub surge_multiplier: f64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub currency: String,
    pub promo_applied: bool,
    pub dist_km: f64,
    pub dur_min: f64,
}
