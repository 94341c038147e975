use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use model::config::Config;
use model::driver::VehicleType;
use model::pricing::{FareBreakdown, PricingRule};
use model::promo::PromoCode;
use model::subscription::{PricingUpdateEvent, StreamItem};
use utility::clock::Clock;

use actors::actor::{Actor, SupervisionStrategy};
use actors::actor_ref::ActorRef;
use actors::handler::Handler;
use stream_bus::actor::StreamBusActor;
use stream_bus::StreamBusRef;

use crate::fare::{compute_fare, compute_surge_multiplier, fallback_rule};
use crate::messages::{
    Estimate, Finalize, ObserveDemand, ObserveSupply, RecomputeSurge, RecordPromoUse, Surge, UpsertPricingRule,
    UpsertPromoCode,
};

type ZoneKey = (String, VehicleType);

/// Holds configured fare rules, per-zone demand/supply counters, and the
/// resulting surge multipliers (§4.2). A handler panic resumes in place;
/// restarting would wipe live demand/supply counters and in-flight surge
/// state over a single bad message.
pub struct PricingActor {
    rules: HashMap<(VehicleType, Option<String>), PricingRule>,
    promos: HashMap<String, PromoCode>,
    promo_uses_by_user: HashMap<(String, String), u32>,
    demand: HashMap<ZoneKey, i64>,
    supply: HashMap<ZoneKey, i64>,
    surge: HashMap<ZoneKey, f64>,
    config: Config,
    clock: Arc<dyn Clock>,
    stream_bus: Option<ActorRef<StreamBusActor>>,
}

impl PricingActor {
    pub fn new(config: Config, clock: Arc<dyn Clock>, stream_bus: Option<ActorRef<StreamBusActor>>) -> Self {
        Self {
            rules: HashMap::new(),
            promos: HashMap::new(),
            promo_uses_by_user: HashMap::new(),
            demand: HashMap::new(),
            supply: HashMap::new(),
            surge: HashMap::new(),
            config,
            clock,
            stream_bus,
        }
    }

    fn rule_for(&self, vehicle_type: VehicleType, city: Option<&str>, at_t: chrono::DateTime<Utc>) -> PricingRule {
        if let Some(city) = city {
            if let Some(rule) = self.rules.get(&(vehicle_type, Some(city.to_string()))) {
                if rule.covers(at_t) {
                    return rule.clone();
                }
            }
        }
        if let Some(rule) = self.rules.get(&(vehicle_type, None)) {
            if rule.covers(at_t) {
                return rule.clone();
            }
        }
        fallback_rule(vehicle_type, at_t)
    }

    fn surge_for(&self, zone_geohash: &str, vehicle_type: VehicleType) -> f64 {
        self.surge
            .get(&(zone_geohash.to_string(), vehicle_type))
            .copied()
            .unwrap_or(1.0)
    }

    /// Looks up `code`, returning `None` (promo ignored, not an error) if
    /// it's missing or `user_id` has already exhausted `max_uses_per_user`.
    fn promo_for(&self, code: Option<&str>, user_id: Option<&str>) -> Option<&PromoCode> {
        let promo = code.and_then(|code| self.promos.get(code))?;
        if let Some(user_id) = user_id {
            let used = self
                .promo_uses_by_user
                .get(&(promo.code.clone(), user_id.to_string()))
                .copied()
                .unwrap_or(0);
            if used >= promo.max_uses_per_user {
                return None;
            }
        }
        Some(promo)
    }
}

impl Actor for PricingActor {
    fn on_fail(&mut self, error: Box<dyn Any + Send>) -> SupervisionStrategy {
        tracing::error!(?error, "pricing handler panicked, resuming with existing state");
        SupervisionStrategy::Resume
    }
}

#[async_trait]
impl Handler<Estimate> for PricingActor {
    async fn handle(&mut self, msg: Estimate) -> FareBreakdown {
        let rule = self.rule_for(msg.vehicle_type, msg.city.as_deref(), msg.at_t);
        let surge = self.surge_for(&msg.origin_zone_geohash, msg.vehicle_type);
        let promo = self.promo_for(msg.promo_code.as_deref(), msg.user_id.as_deref()).cloned();
        compute_fare(
            &rule,
            msg.dist_km,
            msg.dur_min,
            surge,
            msg.at_t,
            promo.as_ref(),
            msg.vehicle_type,
            msg.city.as_deref(),
            msg.first_ride,
        )
    }
}

#[async_trait]
impl Handler<Finalize> for PricingActor {
    async fn handle(&mut self, msg: Finalize) -> FareBreakdown {
        let rule = self.rule_for(msg.vehicle_type, msg.city.as_deref(), msg.at_t);
        let surge = self.surge_for(&msg.origin_zone_geohash, msg.vehicle_type);
        let promo = self.promo_for(msg.promo_code.as_deref(), msg.user_id.as_deref()).cloned();
        // finalize charges on the actual distance/duration measured at
        // completion, not the estimate's; `first_ride` no longer applies
        // because a promo credited at finalize implies the ride happened.
        compute_fare(
            &rule,
            msg.actual_distance_km,
            msg.actual_duration_min,
            surge,
            msg.at_t,
            promo.as_ref(),
            msg.vehicle_type,
            msg.city.as_deref(),
            true,
        )
    }
}

#[async_trait]
impl Handler<ObserveDemand> for PricingActor {
    async fn handle(&mut self, msg: ObserveDemand) {
        let entry = self.demand.entry((msg.zone_geohash, msg.vehicle_type)).or_insert(0);
        *entry = (*entry + msg.delta).max(0);
    }
}

#[async_trait]
impl Handler<ObserveSupply> for PricingActor {
    async fn handle(&mut self, msg: ObserveSupply) {
        self.supply.insert((msg.zone_geohash, msg.vehicle_type), msg.online_count.max(0));
    }
}

#[async_trait]
impl Handler<Surge> for PricingActor {
    async fn handle(&mut self, msg: Surge) -> f64 {
        self.surge_for(&msg.zone_geohash, msg.vehicle_type)
    }
}

#[async_trait]
impl Handler<RecomputeSurge> for PricingActor {
    async fn handle(&mut self, _msg: RecomputeSurge) -> usize {
        let now = self.clock.now();
        let mut changed = 0usize;
        let zones: Vec<ZoneKey> = self.demand.keys().chain(self.supply.keys()).cloned().collect();

        for (zone_geohash, vehicle_type) in zones {
            let key = (zone_geohash.clone(), vehicle_type);
            let demand_count = self.demand.get(&key).copied().unwrap_or(0);
            let supply_count = self.supply.get(&key).copied().unwrap_or(0);
            let new_multiplier = compute_surge_multiplier(demand_count, supply_count, self.config.surge_max);
            let previous = self.surge.get(&key).copied().unwrap_or(1.0);

            if (new_multiplier - previous).abs() >= 0.1 {
                self.surge.insert(key.clone(), new_multiplier);
                changed += 1;
                if let Some(bus) = &self.stream_bus {
                    let event = PricingUpdateEvent {
                        zone_geohash: zone_geohash.clone(),
                        vehicle_type,
                        multiplier: new_multiplier,
                        reason: Some(format!("demand/supply {demand_count}/{supply_count}")),
                        t: now,
                    };
                    let _ = bus.publish(StreamItem::PricingUpdate(event)).await;
                }
            } else {
                self.surge.insert(key, new_multiplier);
            }
        }
        changed
    }
}

#[async_trait]
impl Handler<UpsertPricingRule> for PricingActor {
    async fn handle(&mut self, msg: UpsertPricingRule) {
        self.rules.insert((msg.rule.vehicle_type, msg.rule.city.clone()), msg.rule);
    }
}

#[async_trait]
impl Handler<UpsertPromoCode> for PricingActor {
    async fn handle(&mut self, msg: UpsertPromoCode) {
        self.promos.insert(msg.promo.code.clone(), msg.promo);
    }
}

#[async_trait]
impl Handler<RecordPromoUse> for PricingActor {
    async fn handle(&mut self, msg: RecordPromoUse) {
        if let Some(promo) = self.promos.get_mut(&msg.code) {
            promo.uses += 1;
        }
        if let Some(user_id) = msg.user_id {
            *self.promo_uses_by_user.entry((msg.code, user_id)).or_insert(0) += 1;
        }
    }
}
