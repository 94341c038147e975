//! Fare computation and surge pricing (§4.2), run as a single
//! supervised `Actor`. Distance/duration/zone geohash are resolved by the
//! caller via `geo_index` first; this component owns only the money math.

pub mod actor;
pub mod fare;
pub mod messages;

use std::sync::Arc;

use actors::actor_ref::ActorRef;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::config::Config;
use model::driver::VehicleType;
use model::error::{CoreError, CoreResult};
use model::pricing::{FareBreakdown, PricingRule};
use model::promo::PromoCode;
use stream_bus::actor::StreamBusActor;
use utility::clock::Clock;

use messages::{
    Estimate, Finalize, ObserveDemand, ObserveSupply, RecomputeSurge, RecordPromoUse, Surge, UpsertPricingRule,
    UpsertPromoCode,
};

/// Spawns the Pricing actor, supervised with resume-on-panic (see
/// [`actor::PricingActor::on_fail`]). `stream_bus` is `None` in tests or
/// standalone use; when present, surge changes publish `pricing_update`
/// events on it.
pub fn spawn(config: Config, clock: Arc<dyn Clock>, stream_bus: Option<ActorRef<StreamBusActor>>) -> ActorRef<actor::PricingActor> {
    actors::run(move || actor::PricingActor::new(config.clone(), clock.clone(), stream_bus.clone()))
}

#[async_trait]
pub trait PricingRef {
    #[allow(clippy::too_many_arguments)]
    async fn estimate(
        &self,
        dist_km: f64,
        dur_min: f64,
        vehicle_type: VehicleType,
        city: Option<String>,
        origin_zone_geohash: String,
        promo_code: Option<String>,
        user_id: Option<String>,
        first_ride: bool,
        at_t: DateTime<Utc>,
    ) -> CoreResult<FareBreakdown>;

    #[allow(clippy::too_many_arguments)]
    async fn finalize(
        &self,
        actual_distance_km: f64,
        actual_duration_min: f64,
        vehicle_type: VehicleType,
        city: Option<String>,
        origin_zone_geohash: String,
        promo_code: Option<String>,
        user_id: Option<String>,
        at_t: DateTime<Utc>,
    ) -> CoreResult<FareBreakdown>;

    async fn observe_demand(&self, zone_geohash: String, vehicle_type: VehicleType, delta: i64) -> CoreResult<()>;

    async fn observe_supply(&self, zone_geohash: String, vehicle_type: VehicleType, online_count: i64) -> CoreResult<()>;

    async fn surge(&self, zone_geohash: String, vehicle_type: VehicleType) -> CoreResult<f64>;

    async fn recompute_surge(&self) -> CoreResult<usize>;

    async fn upsert_pricing_rule(&self, rule: PricingRule) -> CoreResult<()>;

    async fn upsert_promo_code(&self, promo: PromoCode) -> CoreResult<()>;

    async fn record_promo_use(&self, code: String, user_id: Option<String>) -> CoreResult<()>;
}

#[async_trait]
impl PricingRef for ActorRef<actor::PricingActor> {
    async fn estimate(
        &self,
        dist_km: f64,
        dur_min: f64,
        vehicle_type: VehicleType,
        city: Option<String>,
        origin_zone_geohash: String,
        promo_code: Option<String>,
        user_id: Option<String>,
        first_ride: bool,
        at_t: DateTime<Utc>,
    ) -> CoreResult<FareBreakdown> {
        self.ask(Estimate {
            dist_km,
            dur_min,
            vehicle_type,
            city,
            origin_zone_geohash,
            promo_code,
            user_id,
            first_ride,
            at_t,
        })
        .await
        .map_err(mailbox_error)
    }

    async fn finalize(
        &self,
        actual_distance_km: f64,
        actual_duration_min: f64,
        vehicle_type: VehicleType,
        city: Option<String>,
        origin_zone_geohash: String,
        promo_code: Option<String>,
        user_id: Option<String>,
        at_t: DateTime<Utc>,
    ) -> CoreResult<FareBreakdown> {
        self.ask(Finalize {
            actual_distance_km,
            actual_duration_min,
            vehicle_type,
            city,
            origin_zone_geohash,
            promo_code,
            user_id,
            at_t,
        })
        .await
        .map_err(mailbox_error)
    }

    async fn observe_demand(&self, zone_geohash: String, vehicle_type: VehicleType, delta: i64) -> CoreResult<()> {
        self.ask(ObserveDemand { zone_geohash, vehicle_type, delta }).await.map_err(mailbox_error)
    }

    async fn observe_supply(&self, zone_geohash: String, vehicle_type: VehicleType, online_count: i64) -> CoreResult<()> {
        self.ask(ObserveSupply { zone_geohash, vehicle_type, online_count }).await.map_err(mailbox_error)
    }

    async fn surge(&self, zone_geohash: String, vehicle_type: VehicleType) -> CoreResult<f64> {
        self.ask(Surge { zone_geohash, vehicle_type }).await.map_err(mailbox_error)
    }

    async fn recompute_surge(&self) -> CoreResult<usize> {
        self.ask(RecomputeSurge).await.map_err(mailbox_error)
    }

    async fn upsert_pricing_rule(&self, rule: PricingRule) -> CoreResult<()> {
        self.ask(UpsertPricingRule { rule }).await.map_err(mailbox_error)
    }

    async fn upsert_promo_code(&self, promo: PromoCode) -> CoreResult<()> {
        self.ask(UpsertPromoCode { promo }).await.map_err(mailbox_error)
    }

    async fn record_promo_use(&self, code: String, user_id: Option<String>) -> CoreResult<()> {
        self.ask(RecordPromoUse { code, user_id }).await.map_err(mailbox_error)
    }
}

fn mailbox_error<A, M>(err: actors::actor::ActorError<A, M>) -> CoreError
where
    A: actors::actor::Actor,
    M: actors::mailbox::Mailbox<A>,
{
    CoreError::Internal(format!("pricing actor unavailable: {err:?}"))
}
