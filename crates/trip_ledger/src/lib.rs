//! The Trip Aggregate & Event Log (§4.3): append-only source of
//! truth for every trip, run as a single supervised `Actor`. Higher-level
//! commands (`request_trip`, `assign_driver`, ...) are themselves built on
//! top of the low-level `append`/`load`/`rebuild` contract exposed here.

pub mod actor;
pub mod messages;
pub mod projection;

use std::sync::Arc;

use actors::actor_ref::ActorRef;
use async_trait::async_trait;
use model::config::Config;
use model::driver::{DriverId, VehicleId, VehicleType};
use model::error::{CoreError, CoreResult};
use model::event::TripEvent;
use model::location::Location;
use model::trip::{CancelledBy, RiderId, Trip, TripId, TripStatus};
use stream_bus::actor::StreamBusActor;
use utility::clock::Clock;

use messages::{
    Append, AppendPayload, AssignDriver, CancelTrip, ChangeStatus, CompleteTrip, DropSnapshots,
    FailTrip, Load, Rebuild, RequestTrip, StartTrip,
};

/// Spawns the Trip Ledger actor, supervised with resume-on-panic (see
/// [`actor::TripLedgerActor::on_fail`]). `stream_bus` is `None` in tests or
/// standalone use; when present, every committed transition publishes a
/// `trip_update` event on it.
pub fn spawn(
    config: Config,
    clock: Arc<dyn Clock>,
    stream_bus: Option<ActorRef<StreamBusActor>>,
) -> ActorRef<actor::TripLedgerActor> {
    actors::run(move || actor::TripLedgerActor::new(config.clone(), clock.clone(), stream_bus.clone()))
}

#[async_trait]
pub trait TripLedgerRef {
    #[allow(clippy::too_many_arguments)]
    async fn request_trip(
        &self,
        rider_id: RiderId,
        pickup: Location,
        destination: Location,
        vehicle_type: VehicleType,
        passenger_count: u32,
        promo_code: Option<String>,
        user_id: Option<String>,
    ) -> CoreResult<Trip>;

    async fn assign_driver(
        &self,
        trip_id: TripId,
        driver_id: DriverId,
        vehicle_id: VehicleId,
        user_id: Option<String>,
    ) -> CoreResult<Trip>;

    async fn change_status(&self, trip_id: TripId, new_status: TripStatus, user_id: Option<String>) -> CoreResult<Trip>;

    async fn start_trip(&self, trip_id: TripId, start_location: Location, user_id: Option<String>) -> CoreResult<Trip>;

    async fn complete_trip(
        &self,
        trip_id: TripId,
        end_location: Location,
        fare_actual_cents: Option<i64>,
        user_id: Option<String>,
    ) -> CoreResult<Trip>;

    async fn cancel_trip(
        &self,
        trip_id: TripId,
        cancelled_by: CancelledBy,
        reason: Option<String>,
        user_id: Option<String>,
    ) -> CoreResult<Trip>;

    async fn fail_trip(&self, trip_id: TripId, reason: String) -> CoreResult<Trip>;

    async fn append(&self, trip_id: TripId, events: Vec<AppendPayload>, expected_version: u64) -> CoreResult<Vec<TripEvent>>;

    async fn load(&self, trip_id: TripId) -> CoreResult<Vec<TripEvent>>;

    async fn rebuild(&self, trip_id: TripId) -> CoreResult<Trip>;

    async fn drop_snapshots(&self) -> CoreResult<()>;
}

#[async_trait]
impl TripLedgerRef for ActorRef<actor::TripLedgerActor> {
    async fn request_trip(
        &self,
        rider_id: RiderId,
        pickup: Location,
        destination: Location,
        vehicle_type: VehicleType,
        passenger_count: u32,
        promo_code: Option<String>,
        user_id: Option<String>,
    ) -> CoreResult<Trip> {
        self.ask(RequestTrip {
            rider_id,
            pickup,
            destination,
            vehicle_type,
            passenger_count,
            promo_code,
            user_id,
        })
        .await
        .map_err(mailbox_error)?
    }

    async fn assign_driver(
        &self,
        trip_id: TripId,
        driver_id: DriverId,
        vehicle_id: VehicleId,
        user_id: Option<String>,
    ) -> CoreResult<Trip> {
        self.ask(AssignDriver {
            trip_id,
            driver_id,
            vehicle_id,
            user_id,
        })
        .await
        .map_err(mailbox_error)?
    }

    async fn change_status(&self, trip_id: TripId, new_status: TripStatus, user_id: Option<String>) -> CoreResult<Trip> {
        self.ask(ChangeStatus {
            trip_id,
            new_status,
            user_id,
        })
        .await
        .map_err(mailbox_error)?
    }

    async fn start_trip(&self, trip_id: TripId, start_location: Location, user_id: Option<String>) -> CoreResult<Trip> {
        self.ask(StartTrip {
            trip_id,
            start_location,
            user_id,
        })
        .await
        .map_err(mailbox_error)?
    }

    async fn complete_trip(
        &self,
        trip_id: TripId,
        end_location: Location,
        fare_actual_cents: Option<i64>,
        user_id: Option<String>,
    ) -> CoreResult<Trip> {
        self.ask(CompleteTrip {
            trip_id,
            end_location,
            fare_actual_cents,
            user_id,
        })
        .await
        .map_err(mailbox_error)?
    }

    async fn cancel_trip(
        &self,
        trip_id: TripId,
        cancelled_by: CancelledBy,
        reason: Option<String>,
        user_id: Option<String>,
    ) -> CoreResult<Trip> {
        self.ask(CancelTrip {
            trip_id,
            cancelled_by,
            reason,
            user_id,
        })
        .await
        .map_err(mailbox_error)?
    }

    async fn fail_trip(&self, trip_id: TripId, reason: String) -> CoreResult<Trip> {
        self.ask(FailTrip { trip_id, reason }).await.map_err(mailbox_error)?
    }

    async fn append(&self, trip_id: TripId, events: Vec<AppendPayload>, expected_version: u64) -> CoreResult<Vec<TripEvent>> {
        self.ask(Append {
            trip_id,
            events,
            expected_version,
        })
        .await
        .map_err(mailbox_error)?
    }

    async fn load(&self, trip_id: TripId) -> CoreResult<Vec<TripEvent>> {
        self.ask(Load { trip_id }).await.map_err(mailbox_error)?
    }

    async fn rebuild(&self, trip_id: TripId) -> CoreResult<Trip> {
        self.ask(Rebuild { trip_id }).await.map_err(mailbox_error)?
    }

    async fn drop_snapshots(&self) -> CoreResult<()> {
        self.ask(DropSnapshots).await.map_err(mailbox_error)
    }
}

fn mailbox_error<A, M>(err: actors::actor::ActorError<A, M>) -> CoreError
where
    A: actors::actor::Actor,
    M: actors::mailbox::Mailbox<A>,
{
    CoreError::Internal(format!("trip ledger actor unavailable: {err:?}"))
}
