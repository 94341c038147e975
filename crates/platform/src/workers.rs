//! The three recurring background jobs named in §5/§9, each a thin
//! [`crate::worker::Worker`] around one actor call.

use std::time::Duration;

use actors::actor_ref::ActorRef;
use async_trait::async_trait;
use geo_index::actor::GeoIndexActor;
use geo_index::GeoIndexRef;
use model::config::Config;
use model::error::CoreError;
use pricing::actor::PricingActor;
use pricing::PricingRef;
use stream_bus::actor::StreamBusActor;
use stream_bus::StreamBusRef;

use crate::worker::Worker;

/// Evicts driver positions past their TTL (§4.1). Ticks at a fraction of
/// the TTL so an expired entry is never visible for much longer than the
/// TTL itself, without sweeping so often it competes for the actor's
/// mailbox with live traffic.
pub struct PositionSweepWorker {
    pub geo: ActorRef<GeoIndexActor>,
    pub interval: Duration,
}

#[async_trait]
impl Worker for PositionSweepWorker {
    type Error = CoreError;

    fn name(&self) -> &'static str {
        "position_sweep"
    }

    async fn tick(&mut self) -> Result<(), CoreError> {
        let evicted = self.geo.sweep_expired().await?;
        if evicted > 0 {
            tracing::debug!(evicted, "swept expired driver positions");
        }
        Ok(())
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Refreshes pricing's per-zone supply counters from the live Geo Index
/// (§4.2 `observe_supply`, "refreshed from Geo Index" — the mechanism is
/// left open; this build polls on the same cadence as surge
/// recomputation since a fresher count has no effect between recomputes).
pub struct SupplySyncWorker {
    pub geo: ActorRef<GeoIndexActor>,
    pub pricing: ActorRef<PricingActor>,
    pub geohash_precision: usize,
    pub interval: Duration,
}

#[async_trait]
impl Worker for SupplySyncWorker {
    type Error = CoreError;

    fn name(&self) -> &'static str {
        "supply_sync"
    }

    async fn tick(&mut self) -> Result<(), CoreError> {
        let counts = self.geo.snapshot_supply(self.geohash_precision).await?;
        for (zone_geohash, vehicle_type, online_count) in counts {
            self.pricing.observe_supply(zone_geohash, vehicle_type, online_count).await?;
        }
        Ok(())
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Recomputes surge multipliers from demand/supply and publishes
/// `pricing_update` events for every zone whose multiplier moved by more
/// than the §4.2 threshold (handled inside the pricing actor itself; this
/// worker only supplies the cadence).
pub struct SurgeRecomputeWorker {
    pub pricing: ActorRef<PricingActor>,
    pub interval: Duration,
}

#[async_trait]
impl Worker for SurgeRecomputeWorker {
    type Error = CoreError;

    fn name(&self) -> &'static str {
        "surge_recompute"
    }

    async fn tick(&mut self) -> Result<(), CoreError> {
        let changed = self.pricing.recompute_surge().await?;
        if changed > 0 {
            tracing::debug!(changed, "surge multipliers changed");
        }
        Ok(())
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Pushes a synthetic heartbeat into every live subscription's queue so a
/// client can detect disconnect by its absence (§4.5).
pub struct HeartbeatWorker {
    pub stream_bus: ActorRef<StreamBusActor>,
    pub interval: Duration,
}

#[async_trait]
impl Worker for HeartbeatWorker {
    type Error = CoreError;

    fn name(&self) -> &'static str {
        "heartbeat"
    }

    async fn tick(&mut self) -> Result<(), CoreError> {
        self.stream_bus.heartbeat_tick().await?;
        Ok(())
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Builds the worker set for a [`crate::RidePlatform`], one per recurring
/// job named in §5/§9, wired from `config`.
pub fn build(
    config: &Config,
    geo: ActorRef<GeoIndexActor>,
    pricing: ActorRef<PricingActor>,
    stream_bus: ActorRef<StreamBusActor>,
) -> (PositionSweepWorker, SupplySyncWorker, SurgeRecomputeWorker, HeartbeatWorker) {
    let position_sweep_interval = Duration::from_secs((config.position_ttl_s / 5).max(1));
    let surge_interval = Duration::from_secs(config.surge_recompute_interval_s.max(1));
    let heartbeat_interval = Duration::from_secs(config.heartbeat_interval_s.max(1));

    (
        PositionSweepWorker {
            geo: geo.clone(),
            interval: position_sweep_interval,
        },
        SupplySyncWorker {
            geo,
            pricing: pricing.clone(),
            geohash_precision: config.geohash_precision,
            interval: surge_interval,
        },
        SurgeRecomputeWorker {
            pricing,
            interval: surge_interval,
        },
        HeartbeatWorker {
            stream_bus,
            interval: heartbeat_interval,
        },
    )
}
