use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::driver::VehicleType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    FixedAmount,
}

/// A promo code (§3, §4.2). `uses` and `uses_per_user` are updated only on
/// trip completion, never on mere application — applying a promo that is
/// later abandoned must not burn a use.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PromoCode {
    pub code: String,
    pub discount_type: DiscountType,
    pub value: f64,
    pub max_discount_cents: Option<i64>,
    pub min_trip_cents: Option<i64>,
    pub max_uses: Option<u32>,
    pub max_uses_per_user: u32,
    pub uses: u32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub first_ride_only: bool,
    pub applicable_vehicle_types: Vec<VehicleType>,
    pub applicable_cities: Vec<String>,
}

impl PromoCode {
    pub fn is_active(&self, at: DateTime<Utc>) -> bool {
        self.valid_from <= at
            && at < self.valid_until
            && self.max_uses.map(|max| self.uses < max).unwrap_or(true)
    }

    pub fn applies_to(&self, vehicle_type: VehicleType, city: Option<&str>) -> bool {
        let vehicle_ok = self.applicable_vehicle_types.is_empty()
            || self.applicable_vehicle_types.contains(&vehicle_type);
        let city_ok = self.applicable_cities.is_empty()
            || city
                .map(|c| self.applicable_cities.iter().any(|ac| ac == c))
                .unwrap_or(false);
        vehicle_ok && city_ok
    }

    /// Computes the discount in cents for a trip of `amount_before_discount`
    /// cents, or `None` if the promo does not apply (invalid promos are
    /// silently ignored, never an error — §4.2).
    pub fn compute_discount(&self, amount_before_discount_cents: i64) -> Option<i64> {
        if let Some(min) = self.min_trip_cents {
            if amount_before_discount_cents < min {
                return None;
            }
        }

        let raw = match self.discount_type {
            DiscountType::Percentage => {
                (amount_before_discount_cents as f64 * self.value / 100.0).round() as i64
            }
            DiscountType::FixedAmount => self.value.round() as i64,
        };

        let capped = match self.max_discount_cents {
            Some(max) => raw.min(max),
            None => raw,
        };

        Some(capped.clamp(0, amount_before_discount_cents))
    }
}
