//! The fare and surge formulas (§4.2), isolated from actor plumbing so they
//! can be unit-tested directly against worked examples.

use chrono::{DateTime, Datelike, Timelike, Utc};
use model::driver::VehicleType;
use model::pricing::{FareBreakdown, PricingRule};
use model::promo::PromoCode;

/// Rounds a monetary amount to the nearest cent, half-to-even.
pub fn banker_round(x: f64) -> i64 {
    let floor = x.floor();
    let diff = x - floor;
    let floor_i = floor as i64;
    if diff < 0.5 {
        floor_i
    } else if diff > 0.5 {
        floor_i + 1
    } else if floor_i % 2 == 0 {
        floor_i
    } else {
        floor_i + 1
    }
}

pub fn fallback_rule(vehicle_type: VehicleType, now: DateTime<Utc>) -> PricingRule {
    use utility::id::Id;
    PricingRule {
        id: Id::new(uuid::Uuid::nil()),
        vehicle_type,
        city: None,
        base_cents: 250,
        per_km_cents: 150,
        per_min_cents: 25,
        booking_fee_cents: 150,
        service_fee_cents: 100,
        time_multipliers: Default::default(),
        day_multipliers: Default::default(),
        min_cents: Some(500),
        max_cents: None,
        valid_from: now,
        valid_until: None,
        active: true,
    }
}

/// Per (geohash, vehicle_type) surge formula (§4.2). `None` supply reads as
/// `supply_count == 0`.
pub fn compute_surge_multiplier(demand_count: i64, supply_count: i64, surge_max: f64) -> f64 {
    let raw = if supply_count <= 0 {
        2.0
    } else {
        let r = demand_count as f64 / supply_count as f64;
        if r <= 1.5 {
            1.0
        } else if r <= 2.0 {
            1.0 + (r - 1.0) * 0.3
        } else {
            (1.0 + (r - 1.0) * 0.5).min(3.0)
        }
    };
    let capped = raw.min(surge_max).max(1.0);
    (capped * 10.0).round() / 10.0
}

#[allow(clippy::too_many_arguments)]
pub fn compute_fare(
    rule: &PricingRule,
    dist_km: f64,
    dur_min: f64,
    surge_multiplier: f64,
    at_t: DateTime<Utc>,
    promo: Option<&PromoCode>,
    vehicle_type: VehicleType,
    city: Option<&str>,
    first_ride: bool,
) -> FareBreakdown {
    let time_multiplier = rule.time_multiplier_at(at_t.hour());
    let day_multiplier = rule.day_multiplier_at(at_t.weekday().num_days_from_monday() as u8);

    let distance_cents = banker_round(dist_km * rule.per_km_cents as f64);
    let duration_cents = banker_round(dur_min * rule.per_min_cents as f64);

    let inner_raw = rule.base_cents as f64 + dist_km * rule.per_km_cents as f64 + dur_min * rule.per_min_cents as f64;
    let inner = banker_round(inner_raw) as f64;
    let scaled = inner * time_multiplier * day_multiplier * surge_multiplier;
    let with_fees = scaled + rule.booking_fee_cents as f64 + rule.service_fee_cents as f64;
    let pre_discount = banker_round(with_fees);

    let clamped = match (rule.min_cents, rule.max_cents) {
        (Some(min), Some(max)) => pre_discount.clamp(min, max),
        (Some(min), None) => pre_discount.max(min),
        (None, Some(max)) => pre_discount.min(max),
        (None, None) => pre_discount,
    };

    let promo_applied_rule = promo.filter(|p| {
        p.is_active(at_t) && p.applies_to(vehicle_type, city) && (!p.first_ride_only || first_ride)
    });
    let discount_cents = promo_applied_rule
        .and_then(|p| p.compute_discount(clamped))
        .unwrap_or(0);

    let total_cents = (clamped - discount_cents).max(0);

    FareBreakdown {
        base_cents: rule.base_cents,
        distance_cents,
        duration_cents,
        booking_fee_cents: rule.booking_fee_cents,
        service_fee_cents: rule.service_fee_cents,
        time_multiplier,
        day_multiplier,
        surge_multiplier,
        discount_cents,
        total_cents,
        currency: "usd".to_string(),
        promo_applied: discount_cents > 0,
        dist_km,
        dur_min,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surge_is_one_when_supply_exceeds_demand() {
        assert_eq!(compute_surge_multiplier(4, 10, 5.0), 1.0);
    }

    #[test]
    fn surge_zero_supply_is_two() {
        assert_eq!(compute_surge_multiplier(5, 0, 5.0), 2.0);
    }

    #[test]
    fn surge_high_demand_caps_at_three_before_surge_max() {
        // r = 20/4 = 5 -> 1 + (5-1)*0.5 = 3.0, capped by min(3.0, ...)
        assert_eq!(compute_surge_multiplier(20, 4, 5.0), 3.0);
    }

    #[test]
    fn surge_never_exceeds_configured_max() {
        assert!(compute_surge_multiplier(1000, 1, 2.5) <= 2.5);
    }

    #[test]
    fn banker_round_half_to_even() {
        assert_eq!(banker_round(2.5), 2);
        assert_eq!(banker_round(3.5), 4);
        assert_eq!(banker_round(2.4), 2);
        assert_eq!(banker_round(2.6), 3);
    }

    #[test]
    fn fare_is_never_negative() {
        let rule = fallback_rule(VehicleType::Sedan, Utc::now());
        let breakdown = compute_fare(&rule, 0.1, 1.0, 1.0, Utc::now(), None, VehicleType::Sedan, None, false);
        assert!(breakdown.total_cents >= 0);
    }
}
