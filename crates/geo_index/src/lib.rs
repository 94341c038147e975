//! Live driver positions and proximity/ETA math (§4.1), run as a
//! single supervised `Actor` behind a mailbox so every mutation is
//! serialized without a lock visible to callers.

pub mod actor;
pub mod messages;

use std::sync::Arc;

use actors::actor_ref::ActorRef;
use async_trait::async_trait;
use model::config::Config;
use model::driver::{DriverId, DriverPosition, DriverStatus, NearbyDriver, VehicleId, VehicleType};
use model::error::{CoreError, CoreResult};
use model::location::{DistanceMethod, DistanceResult, Location};
use utility::clock::Clock;

pub use messages::{DecodeResult, EtaResult};

use messages::{
    CalculateDistance, CalculateEta, Decode, FindNearby, Geohash, RemovePosition, SnapshotSupply, SweepExpired,
    UpdatePosition,
};

/// Spawns the Geo Index actor, supervised per the `actors` crate's default
/// restart-on-panic behavior overridden to resume-on-panic (see
/// [`actor::GeoIndexActor::on_fail`]).
pub fn spawn(config: Config, clock: Arc<dyn Clock>) -> ActorRef<actor::GeoIndexActor> {
    actors::run(move || actor::GeoIndexActor::new(config.clone(), clock.clone()))
}

#[async_trait]
pub trait GeoIndexRef {
    #[allow(clippy::too_many_arguments)]
    async fn update_position(
        &self,
        driver_id: DriverId,
        vehicle_id: VehicleId,
        location: Location,
        status: DriverStatus,
        vehicle_type: VehicleType,
        rating: f64,
    ) -> CoreResult<()>;

    async fn remove_position(&self, driver_id: DriverId) -> CoreResult<()>;

    async fn find_nearby(
        &self,
        center: Location,
        radius_km: f64,
        vehicle_types: Option<Vec<VehicleType>>,
        only_available: bool,
        limit: Option<usize>,
    ) -> CoreResult<Vec<NearbyDriver>>;

    async fn distance(&self, a: Location, b: Location, method: DistanceMethod) -> CoreResult<DistanceResult>;

    async fn eta(
        &self,
        origin: Location,
        dest: Location,
        vehicle_type: VehicleType,
        departure_t: chrono::DateTime<chrono::Utc>,
        include_traffic: bool,
    ) -> CoreResult<EtaResult>;

    async fn geohash(&self, location: Location, precision: usize) -> CoreResult<String>;

    async fn decode(&self, geohash: String) -> CoreResult<Option<DecodeResult>>;

    /// Evicts expired positions; called by the platform's position-TTL
    /// `Worker`, never scheduled by this crate itself.
    async fn sweep_expired(&self) -> CoreResult<usize>;

    /// Online-driver counts per `(zone_geohash, vehicle_type)` at the given
    /// geohash precision; called by the platform's supply-sync `Worker` to
    /// keep pricing's supply counters current.
    async fn snapshot_supply(&self, precision: usize) -> CoreResult<Vec<(String, VehicleType, i64)>>;
}

#[async_trait]
impl GeoIndexRef for ActorRef<actor::GeoIndexActor> {
    async fn update_position(
        &self,
        driver_id: DriverId,
        vehicle_id: VehicleId,
        location: Location,
        status: DriverStatus,
        vehicle_type: VehicleType,
        rating: f64,
    ) -> CoreResult<()> {
        self.ask(UpdatePosition {
            driver_id,
            vehicle_id,
            location,
            status,
            vehicle_type,
            rating,
        })
        .await
        .map_err(mailbox_error)?
    }

    async fn remove_position(&self, driver_id: DriverId) -> CoreResult<()> {
        self.ask(RemovePosition { driver_id }).await.map_err(mailbox_error)
    }

    async fn find_nearby(
        &self,
        center: Location,
        radius_km: f64,
        vehicle_types: Option<Vec<VehicleType>>,
        only_available: bool,
        limit: Option<usize>,
    ) -> CoreResult<Vec<NearbyDriver>> {
        self.ask(FindNearby {
            center,
            radius_km,
            vehicle_types,
            only_available,
            limit,
        })
        .await
        .map_err(mailbox_error)
    }

    async fn distance(&self, a: Location, b: Location, method: DistanceMethod) -> CoreResult<DistanceResult> {
        self.ask(CalculateDistance { a, b, method }).await.map_err(mailbox_error)
    }

    async fn eta(
        &self,
        origin: Location,
        dest: Location,
        vehicle_type: VehicleType,
        departure_t: chrono::DateTime<chrono::Utc>,
        include_traffic: bool,
    ) -> CoreResult<EtaResult> {
        self.ask(CalculateEta {
            origin,
            dest,
            vehicle_type,
            departure_t,
            include_traffic,
        })
        .await
        .map_err(mailbox_error)
    }

    async fn geohash(&self, location: Location, precision: usize) -> CoreResult<String> {
        self.ask(Geohash { location, precision }).await.map_err(mailbox_error)?
    }

    async fn decode(&self, geohash: String) -> CoreResult<Option<DecodeResult>> {
        self.ask(Decode { geohash }).await.map_err(mailbox_error)
    }

    async fn sweep_expired(&self) -> CoreResult<usize> {
        self.ask(SweepExpired).await.map_err(mailbox_error)
    }

    async fn snapshot_supply(&self, precision: usize) -> CoreResult<Vec<(String, VehicleType, i64)>> {
        self.ask(SnapshotSupply { precision }).await.map_err(mailbox_error)
    }
}

fn mailbox_error<A, M>(err: actors::actor::ActorError<A, M>) -> CoreError
where
    A: actors::actor::Actor,
    M: actors::mailbox::Mailbox<A>,
{
    CoreError::Internal(format!("geo index actor unavailable: {err:?}"))
}
