//! The Matching Dispatcher (§4.4): for each trip in `Requested`,
//! finds and secures one driver within a bounded time. Unlike the other
//! four components this is not an `Actor` — each in-flight request owns a
//! plain `tokio::spawn`ed task (see [`dispatch_loop::run`]), matching the
//! corpus's own one-task-per-long-lived-job idiom rather than forcing
//! per-request state through a shared mailbox.

pub mod dispatch_loop;
pub mod reservation;
pub mod scoring;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use model::config::Config;
use model::driver::{DriverId, VehicleType};
use model::error::{CoreError, CoreResult};
use model::location::Location;
use model::trip::TripId;
use tokio_util::sync::CancellationToken;
use utility::clock::Clock;

use actors::actor_ref::ActorRef;
use geo_index::actor::GeoIndexActor;
use pricing::actor::PricingActor;
use stream_bus::actor::StreamBusActor;
use trip_ledger::actor::TripLedgerActor;

use dispatch_loop::{DispatchContext, DispatchRequest, OfferOutcome, PendingOffers};
use reservation::ReservationStore;

struct ActiveDispatch {
    cancel: CancellationToken,
}

/// Owns the reservation store, recent-reject history and the set of
/// in-flight dispatch loops, so `accept_offer`/`reject_offer`/`cancel` can
/// reach a running loop from the outside (§5 "externally cancellable").
pub struct DispatchManager {
    config: Config,
    clock: Arc<dyn Clock>,
    geo: ActorRef<GeoIndexActor>,
    pricing: ActorRef<PricingActor>,
    trip_ledger: ActorRef<TripLedgerActor>,
    stream_bus: ActorRef<StreamBusActor>,
    reservations: Arc<ReservationStore<DriverId>>,
    reject_history: Arc<Mutex<HashMap<DriverId, chrono::DateTime<chrono::Utc>>>>,
    pending_offers: Arc<PendingOffers>,
    active: Mutex<HashMap<TripId, ActiveDispatch>>,
}

impl DispatchManager {
    pub fn new(
        config: Config,
        clock: Arc<dyn Clock>,
        geo: ActorRef<GeoIndexActor>,
        pricing: ActorRef<PricingActor>,
        trip_ledger: ActorRef<TripLedgerActor>,
        stream_bus: ActorRef<StreamBusActor>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            clock,
            geo,
            pricing,
            trip_ledger,
            stream_bus,
            reservations: Arc::new(ReservationStore::default()),
            reject_history: Arc::new(Mutex::new(HashMap::new())),
            pending_offers: Arc::new(Mutex::new(HashMap::new())),
            active: Mutex::new(HashMap::new()),
        })
    }

    /// Spawns the per-request dispatch loop for `trip_id` and returns
    /// immediately; the loop ends the trip in `DriverAssigned` or `Failed`.
    pub fn dispatch(
        self: &Arc<Self>,
        trip_id: TripId,
        pickup: Location,
        vehicle_type: VehicleType,
        zone_geohash: String,
    ) {
        let cancel = CancellationToken::new();
        self.active.lock().unwrap().insert(
            trip_id,
            ActiveDispatch {
                cancel: cancel.clone(),
            },
        );

        let ctx = DispatchContext {
            config: self.config.clone(),
            clock: self.clock.clone(),
            geo: self.geo.clone(),
            pricing: self.pricing.clone(),
            trip_ledger: self.trip_ledger.clone(),
            stream_bus: self.stream_bus.clone(),
            reservations: self.reservations.clone(),
            reject_history: self.reject_history.clone(),
            pending_offers: self.pending_offers.clone(),
        };
        let request = DispatchRequest {
            trip_id,
            pickup,
            vehicle_type,
            zone_geohash,
        };
        let manager = self.clone();

        tokio::spawn(async move {
            dispatch_loop::run(request, ctx, cancel).await;
            manager.active.lock().unwrap().remove(&trip_id);
        });
    }

    /// A driver accepts a live offer (§6 `AcceptOffer`). Fails with
    /// `reservation_expired` if the reservation backing the offer has
    /// already lapsed, `not_found` if there's no pending offer at all.
    pub async fn accept_offer(&self, trip_id: TripId, driver_id: DriverId) -> CoreResult<()> {
        let now = self.clock.now();
        if !self.reservations.is_held_by(&driver_id, trip_id, now) {
            return Err(CoreError::ReservationExpired(driver_id.to_string()));
        }
        let sender = self.pending_offers.lock().unwrap().remove(&(trip_id, driver_id));
        match sender {
            Some(sender) => {
                let _ = sender.send(OfferOutcome::Accept);
                Ok(())
            }
            None => Err(CoreError::not_found(format!("no pending offer for trip {trip_id} driver {driver_id}"))),
        }
    }

    /// A driver rejects a live offer (§6 `RejectOffer`).
    pub async fn reject_offer(&self, trip_id: TripId, driver_id: DriverId) -> CoreResult<()> {
        let sender = self.pending_offers.lock().unwrap().remove(&(trip_id, driver_id));
        match sender {
            Some(sender) => {
                let _ = sender.send(OfferOutcome::Reject);
                Ok(())
            }
            None => Err(CoreError::not_found(format!("no pending offer for trip {trip_id} driver {driver_id}"))),
        }
    }

    /// Aborts an in-flight dispatch loop for `trip_id` (§4.4 step 6), called
    /// when the platform facade cancels the trip. A no-op if dispatch for
    /// this trip already finished.
    pub fn cancel(&self, trip_id: TripId) {
        if let Some(active) = self.active.lock().unwrap().remove(&trip_id) {
            active.cancel.cancel();
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap().len()
    }

    /// Cancels every in-flight dispatch loop (§5 graceful shutdown: "cancel
    /// active dispatch loops; they clean up reservations").
    pub fn cancel_all(&self) {
        let active = self.active.lock().unwrap();
        for dispatch in active.values() {
            dispatch.cancel.cancel();
        }
    }
}
