//! The `RidePlatform` facade (§6): owns every actor plus the
//! dispatch manager and background workers, and exposes the ten unary and
//! three streaming operations as plain async methods, with no transport of
//! its own. `crates/web` is the only thing that puts a wire protocol in
//! front of it.

pub mod worker;
pub mod workers;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use actors::actor_ref::ActorRef;
use dispatch::DispatchManager;
use geo_index::actor::GeoIndexActor;
use geo_index::{DecodeResult, GeoIndexRef};
use model::config::Config;
use model::driver::{DriverId, DriverStatus, NearbyDriver, VehicleId, VehicleType};
use model::error::{CoreError, CoreResult};
use model::location::{DistanceMethod, DistanceResult, Location};
use model::pricing::FareBreakdown;
use model::subscription::{DriverLocationEvent, Filter, StreamItem, SubscriptionId};
use model::trip::{CancelledBy, RiderId, Trip, TripId, TripStatus};
use pricing::actor::PricingActor;
use pricing::PricingRef;
use stream_bus::actor::StreamBusActor;
use stream_bus::{QueueReceiver, StreamBusRef};
use trip_ledger::actor::TripLedgerActor;
use trip_ledger::TripLedgerRef;
use utility::clock::{Clock, SystemClock};

/// The language-agnostic core of §2: wires the five cooperating
/// components (Geo Index, Pricing Engine, Trip Aggregate, Matching
/// Dispatcher, Stream Bus) plus the recurring background jobs of §5/§9
/// into one handle a caller constructs once and shares.
pub struct RidePlatform {
    config: Config,
    clock: Arc<dyn Clock>,
    geo: ActorRef<GeoIndexActor>,
    pricing: ActorRef<PricingActor>,
    trip_ledger: ActorRef<TripLedgerActor>,
    stream_bus: ActorRef<StreamBusActor>,
    dispatch: Arc<DispatchManager>,
    shutdown: CancellationToken,
    worker_handles: Vec<JoinHandle<()>>,
}

impl RidePlatform {
    /// Builds a platform with the real wall clock. Most callers want this;
    /// `with_clock` exists for tests that need a `ManualClock`.
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Self {
        let stream_bus = stream_bus::spawn(config.clone(), clock.clone());
        let geo = geo_index::spawn(config.clone(), clock.clone());
        let pricing = pricing::spawn(config.clone(), clock.clone(), Some(stream_bus.clone()));
        let trip_ledger = trip_ledger::spawn(config.clone(), clock.clone(), Some(stream_bus.clone()));
        let dispatch = DispatchManager::new(
            config.clone(),
            clock.clone(),
            geo.clone(),
            pricing.clone(),
            trip_ledger.clone(),
            stream_bus.clone(),
        );

        let shutdown = CancellationToken::new();
        let (position_sweep, supply_sync, surge_recompute, heartbeat) =
            workers::build(&config, geo.clone(), pricing.clone(), stream_bus.clone());
        let worker_handles = vec![
            worker::spawn(position_sweep, shutdown.clone()),
            worker::spawn(supply_sync, shutdown.clone()),
            worker::spawn(surge_recompute, shutdown.clone()),
            worker::spawn(heartbeat, shutdown.clone()),
        ];

        Self {
            config,
            clock,
            geo,
            pricing,
            trip_ledger,
            stream_bus,
            dispatch,
            shutdown,
            worker_handles,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reads back the current projection of a trip. Not one of §6's
    /// ten operations itself, but every one of them that takes a `trip_id`
    /// needs a way to look the trip up; exposed directly rather than forcing
    /// every caller through `SubscribeTripUpdates` just to poll state.
    pub async fn get_trip(&self, trip_id: TripId) -> CoreResult<Trip> {
        self.trip_ledger.rebuild(trip_id).await
    }

    // ---- Unary operations (§6) ----

    /// `RequestTrip`: creates the trip, bumps the pickup zone's demand
    /// counter, and kicks off the matching dispatcher in the background.
    /// Returns as soon as the trip exists in `Requested` — callers follow
    /// progress via `SubscribeTripUpdates`, not this call's return value.
    #[allow(clippy::too_many_arguments)]
    pub async fn request_trip(
        &self,
        rider_id: RiderId,
        pickup: Location,
        destination: Location,
        vehicle_type: VehicleType,
        passenger_count: u32,
        promo_code: Option<String>,
    ) -> CoreResult<Trip> {
        let trip = self
            .trip_ledger
            .request_trip(rider_id, pickup, destination, vehicle_type, passenger_count, promo_code, None)
            .await?;

        let zone_geohash = pickup.geohash(self.config.geohash_precision)?;
        self.pricing.observe_demand(zone_geohash.clone(), vehicle_type, 1).await?;
        self.dispatch.dispatch(trip.trip_id, pickup, vehicle_type, zone_geohash);
        Ok(trip)
    }

    /// `CancelTrip`: cancellation is always valid from any non-terminal
    /// state (§4.3) and idempotent from `Cancelled` (handled inside
    /// `trip_ledger`). Also aborts any in-flight dispatch loop and, if the
    /// trip hadn't yet been matched, returns its demand contribution.
    pub async fn cancel_trip(
        &self,
        trip_id: TripId,
        cancelled_by: CancelledBy,
        reason: Option<String>,
    ) -> CoreResult<Trip> {
        let before = self.trip_ledger.rebuild(trip_id).await?;
        let still_requested = before.status == TripStatus::Requested;

        let trip = self.trip_ledger.cancel_trip(trip_id, cancelled_by, reason, None).await?;
        self.dispatch.cancel(trip_id);

        if still_requested {
            if let Ok(zone_geohash) = before.pickup.geohash(self.config.geohash_precision) {
                let _ = self.pricing.observe_demand(zone_geohash, before.vehicle_type, -1).await;
            }
        }
        Ok(trip)
    }

    /// `AcceptOffer`: a driver accepts a live offer (§4.4 step 4).
    pub async fn accept_offer(&self, trip_id: TripId, driver_id: DriverId) -> CoreResult<()> {
        self.dispatch.accept_offer(trip_id, driver_id).await
    }

    /// Driver-app progression through the rest of the §4.3 state machine
    /// (`DriverAssigned -> DriverArriving|DriverArrived -> TripStarted ->
    /// InProgress -> Completed`). These aren't among §6's ten named
    /// RPCs — the dispatch loop only carries a trip to `DriverAssigned` —
    /// but something upstream of the core must drive the remaining legs of
    /// the lifecycle the state machine itself defines, so the facade
    /// exposes them directly rather than leaving `trip_ledger` unreachable
    /// past assignment.
    pub async fn change_trip_status(&self, trip_id: TripId, new_status: TripStatus) -> CoreResult<Trip> {
        self.trip_ledger.change_status(trip_id, new_status, None).await
    }

    /// Begins the trip: requires a driver already assigned (§4.3
    /// precondition), seeds `actual_route` with `start_location`.
    pub async fn start_trip(&self, trip_id: TripId, start_location: Location) -> CoreResult<Trip> {
        self.trip_ledger.start_trip(trip_id, start_location, None).await
    }

    /// Ends the trip: requires `started_at` already set. If `fare_actual_cents`
    /// is omitted, finalizes the fare itself via the Pricing Engine using the
    /// actual route's start/end distance and elapsed duration (§4.2
    /// `finalize`).
    pub async fn complete_trip(&self, trip_id: TripId, end_location: Location, fare_actual_cents: Option<i64>) -> CoreResult<Trip> {
        let before = self.trip_ledger.rebuild(trip_id).await?;

        let fare_actual_cents = match fare_actual_cents {
            Some(cents) => Some(cents),
            None => {
                let started_at = before.started_at.ok_or_else(|| CoreError::invalid_argument("trip has not started"))?;
                let start = before.actual_route.first().copied().unwrap_or(before.pickup);
                let distance = self.geo.distance(start, end_location, DistanceMethod::Haversine).await?;
                let duration_min = (self.clock.now() - started_at).num_seconds().max(0) as f64 / 60.0;
                let zone_geohash = start.geohash(self.config.geohash_precision)?;
                let user_id = before.rider_id.to_string();
                let breakdown = self
                    .pricing
                    .finalize(
                        distance.distance_m / 1000.0,
                        duration_min,
                        before.vehicle_type,
                        None,
                        zone_geohash,
                        before.promo_code.clone(),
                        Some(user_id.clone()),
                        self.clock.now(),
                    )
                    .await?;
                if breakdown.promo_applied {
                    if let Some(code) = &before.promo_code {
                        let _ = self.pricing.record_promo_use(code.clone(), Some(user_id)).await;
                    }
                }
                Some(breakdown.total_cents)
            }
        };
        self.trip_ledger.complete_trip(trip_id, end_location, fare_actual_cents, None).await
    }

    /// `RejectOffer`: a driver declines; the dispatch loop moves on to the
    /// next candidate.
    pub async fn reject_offer(&self, trip_id: TripId, driver_id: DriverId) -> CoreResult<()> {
        self.dispatch.reject_offer(trip_id, driver_id).await
    }

    /// `UpdateDriverPosition`: upserts the position in the Geo Index, then
    /// republishes it on the `driver_locations` topic so subscribers see
    /// live movement.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_driver_position(
        &self,
        driver_id: DriverId,
        vehicle_id: VehicleId,
        location: Location,
        status: DriverStatus,
        vehicle_type: VehicleType,
        rating: f64,
    ) -> CoreResult<()> {
        self.geo
            .update_position(driver_id, vehicle_id, location, status, vehicle_type, rating)
            .await?;

        if let Ok(zone_geohash) = location.geohash(self.config.geohash_precision) {
            let event = DriverLocationEvent {
                driver_id,
                vehicle_id,
                zone_geohash,
                location_lat: location.lat,
                location_lon: location.lon,
                status,
                speed_kmh: None,
                heading: None,
                t: self.clock.now(),
            };
            let _ = self.stream_bus.publish(StreamItem::DriverLocation(event)).await;
        }
        Ok(())
    }

    /// `FindNearbyDrivers`.
    pub async fn find_nearby_drivers(
        &self,
        center: Location,
        radius_km: f64,
        vehicle_types: Option<Vec<VehicleType>>,
        only_available: bool,
        limit: Option<usize>,
    ) -> CoreResult<Vec<NearbyDriver>> {
        self.geo.find_nearby(center, radius_km, vehicle_types, only_available, limit).await
    }

    /// `EstimateFare`. Distance and duration aren't caller-supplied (§6
    /// lists only `origin, dest, vehicle_type, promo?`) so this resolves
    /// them itself via the Geo Index before handing off to Pricing.
    pub async fn estimate_fare(
        &self,
        origin: Location,
        dest: Location,
        vehicle_type: VehicleType,
        promo_code: Option<String>,
    ) -> CoreResult<FareBreakdown> {
        let now = self.clock.now();
        let distance = self.geo.distance(origin, dest, DistanceMethod::Haversine).await?;
        let eta = self.geo.eta(origin, dest, vehicle_type, now, true).await?;
        let zone_geohash = origin.geohash(self.config.geohash_precision)?;

        self.pricing
            .estimate(
                distance.distance_m / 1000.0,
                eta.duration_s as f64 / 60.0,
                vehicle_type,
                None,
                zone_geohash,
                promo_code,
                None,
                false,
                now,
            )
            .await
    }

    /// `CalculateDistance`.
    pub async fn calculate_distance(&self, a: Location, b: Location, method: DistanceMethod) -> CoreResult<DistanceResult> {
        self.geo.distance(a, b, method).await
    }

    /// `CalculateETA`.
    pub async fn calculate_eta(
        &self,
        origin: Location,
        dest: Location,
        vehicle_type: VehicleType,
        departure_t: chrono::DateTime<Utc>,
        include_traffic: bool,
    ) -> CoreResult<geo_index::EtaResult> {
        self.geo.eta(origin, dest, vehicle_type, departure_t, include_traffic).await
    }

    /// `Geohash`.
    pub async fn geohash(&self, location: Location, precision: usize) -> CoreResult<String> {
        self.geo.geohash(location, precision).await
    }

    /// Exposed alongside `geohash` for completeness (§4.1 `decode`); not
    /// itself one of the ten named unary operations but needed to answer
    /// the "cell_extents" half of the `Geohash` operation's output.
    pub async fn decode_geohash(&self, geohash: String) -> CoreResult<Option<DecodeResult>> {
        self.geo.decode(geohash).await
    }

    // ---- Streaming operations (§6) ----

    pub async fn subscribe_driver_locations(
        &self,
        area_geohash_prefix: Option<String>,
        driver_ids: Option<Vec<DriverId>>,
        deadline: Option<chrono::DateTime<Utc>>,
    ) -> CoreResult<(SubscriptionId, QueueReceiver)> {
        self.stream_bus
            .subscribe(
                Filter::DriverLocations(model::subscription::DriverLocationsFilter {
                    area_geohash_prefix,
                    driver_ids,
                }),
                deadline,
            )
            .await
    }

    pub async fn subscribe_trip_updates(
        &self,
        trip_ids: Option<Vec<TripId>>,
        user_ids: Option<Vec<String>>,
        deadline: Option<chrono::DateTime<Utc>>,
    ) -> CoreResult<(SubscriptionId, QueueReceiver)> {
        self.stream_bus
            .subscribe(Filter::TripUpdates(model::subscription::TripUpdatesFilter { trip_ids, user_ids }), deadline)
            .await
    }

    pub async fn subscribe_pricing_updates(
        &self,
        area_geohash_prefix: Option<String>,
        vehicle_types: Option<Vec<VehicleType>>,
        deadline: Option<chrono::DateTime<Utc>>,
    ) -> CoreResult<(SubscriptionId, QueueReceiver)> {
        self.stream_bus
            .subscribe(
                Filter::PricingUpdates(model::subscription::PricingUpdatesFilter {
                    area_geohash_prefix,
                    vehicle_types,
                }),
                deadline,
            )
            .await
    }

    pub async fn unsubscribe(&self, subscription_id: SubscriptionId) -> CoreResult<()> {
        self.stream_bus.unsubscribe(subscription_id).await
    }

    /// Graceful shutdown (§5): stop accepting new dispatch by cancelling
    /// every active loop (reservations clean up on the way out), drain the
    /// Stream Bus, and join the background workers — all within
    /// `shutdown_grace_s`, past which the caller proceeds regardless.
    pub async fn shutdown(&self) {
        self.dispatch.cancel_all();
        let _ = self.stream_bus.shutdown().await;
        self.shutdown.cancel();

        let grace = StdDuration::from_secs(self.config.shutdown_grace_s);
        let _ = tokio::time::timeout(grace, async {
            for handle in &self.worker_handles {
                // Handles aren't `Clone`; polling `is_finished` keeps this
                // usable from `&self` without consuming the platform.
                while !handle.is_finished() {
                    tokio::time::sleep(StdDuration::from_millis(10)).await;
                }
            }
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::location::Location;
    use utility::clock::ManualClock;
    use utility::id::Id;

    fn loc(lat: f64, lon: f64) -> Location {
        Location::new(lat, lon, 5.0, Utc::now()).unwrap()
    }

    fn platform() -> RidePlatform {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        RidePlatform::with_clock(Config::default(), clock)
    }

    #[tokio::test]
    async fn request_trip_creates_requested_trip_and_dispatches() {
        let platform = platform();
        let rider_id: RiderId = Id::new(uuid::Uuid::new_v4());
        let trip = platform
            .request_trip(rider_id, loc(40.7128, -74.0060), loc(40.7589, -73.9851), VehicleType::Sedan, 1, None)
            .await
            .unwrap();
        assert_eq!(trip.status, TripStatus::Requested);
        assert_eq!(trip.vehicle_type, VehicleType::Sedan);
    }

    #[tokio::test]
    async fn cancel_trip_is_idempotent_and_stops_dispatch() {
        let platform = platform();
        let rider_id: RiderId = Id::new(uuid::Uuid::new_v4());
        let trip = platform
            .request_trip(rider_id, loc(40.7128, -74.0060), loc(40.7589, -73.9851), VehicleType::Sedan, 1, None)
            .await
            .unwrap();

        let first = platform
            .cancel_trip(trip.trip_id, CancelledBy::Rider, Some("changed my mind".to_string()))
            .await
            .unwrap();
        let second = platform.cancel_trip(trip.trip_id, CancelledBy::Rider, None).await.unwrap();
        assert_eq!(first.status, TripStatus::Cancelled);
        assert_eq!(second.status, TripStatus::Cancelled);
        assert_eq!(first.version, second.version);
    }

    #[tokio::test]
    async fn estimate_fare_returns_non_negative_total() {
        let platform = platform();
        let breakdown = platform
            .estimate_fare(loc(40.7128, -74.0060), loc(40.7589, -73.9851), VehicleType::Sedan, None)
            .await
            .unwrap();
        assert!(breakdown.total_cents >= 0);
    }

    /// The end-to-end happy path of §8 scenario 1: an online driver
    /// near the pickup accepts the offer, and the trip can then be walked
    /// by hand through the rest of the state machine to `Completed`.
    #[tokio::test]
    async fn full_trip_lifecycle_reaches_completed() {
        let platform = platform();
        let driver_id: DriverId = Id::new(uuid::Uuid::new_v4());
        let vehicle_id: VehicleId = Id::new(uuid::Uuid::new_v4());
        platform
            .update_driver_position(driver_id, vehicle_id, loc(40.7128, -74.0060), DriverStatus::Online, VehicleType::Sedan, 4.9)
            .await
            .unwrap();

        let rider_id: RiderId = Id::new(uuid::Uuid::new_v4());
        let trip = platform
            .request_trip(rider_id, loc(40.7128, -74.0060), loc(40.7589, -73.9851), VehicleType::Sedan, 1, None)
            .await
            .unwrap();

        // The dispatch loop reserves + offers asynchronously; poll until the
        // offer is live rather than assuming it beat this task to the punch.
        let mut accepted = false;
        for _ in 0..200 {
            if platform.accept_offer(trip.trip_id, driver_id).await.is_ok() {
                accepted = true;
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        assert!(accepted, "driver never received a reservable offer");

        let mut assigned = None;
        for _ in 0..200 {
            let polled = platform.get_trip(trip.trip_id).await.unwrap();
            if polled.status == TripStatus::DriverAssigned {
                assigned = Some(polled);
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        let trip = assigned.expect("trip never reached DriverAssigned");

        let trip = platform.change_trip_status(trip.trip_id, TripStatus::DriverArriving).await.unwrap();
        assert_eq!(trip.status, TripStatus::DriverArriving);
        let trip = platform.change_trip_status(trip.trip_id, TripStatus::DriverArrived).await.unwrap();
        assert_eq!(trip.status, TripStatus::DriverArrived);
        let trip = platform.start_trip(trip.trip_id, loc(40.7128, -74.0060)).await.unwrap();
        assert_eq!(trip.status, TripStatus::TripStarted);
        let trip = platform
            .complete_trip(trip.trip_id, loc(40.7589, -73.9851), None)
            .await
            .unwrap();
        assert_eq!(trip.status, TripStatus::Completed);
        assert!(trip.fare_actual_cents.unwrap() >= 0);
        assert!(trip.completed_at.is_some());
    }

    #[tokio::test]
    async fn geohash_rejects_out_of_range_precision() {
        let platform = platform();
        assert!(matches!(
            platform.geohash(loc(40.0, -74.0), 0).await,
            Err(CoreError::InvalidArgument(_))
        ));
    }
}
