//! The per-request dispatch state machine (§4.4): one `tokio::spawn`ed task
//! per trip, advanced by candidate discovery, offer/accept races and timers
//! — never an `Actor`, since this is the one component whose state belongs
//! to a single in-flight request rather than a shared mailbox.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use model::config::Config;
use model::driver::{DriverId, VehicleType};
use model::location::Location;
use model::subscription::{StreamItem, TripUpdateEvent};
use model::trip::{TripId, TripStatus};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use actors::actor_ref::ActorRef;
use geo_index::actor::GeoIndexActor;
use geo_index::GeoIndexRef;
use pricing::actor::PricingActor;
use pricing::PricingRef;
use stream_bus::actor::StreamBusActor;
use stream_bus::StreamBusRef;
use trip_ledger::actor::TripLedgerActor;
use trip_ledger::TripLedgerRef;
use utility::clock::Clock;
use utility::retry::with_backoff;

use crate::reservation::ReservationStore;
use crate::scoring::rank_candidates;

pub enum OfferOutcome {
    Accept,
    Reject,
}

pub type PendingOffers = Mutex<HashMap<(TripId, DriverId), oneshot::Sender<OfferOutcome>>>;

pub struct DispatchRequest {
    pub trip_id: TripId,
    pub pickup: Location,
    pub vehicle_type: VehicleType,
    pub zone_geohash: String,
}

pub struct DispatchContext {
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub geo: ActorRef<GeoIndexActor>,
    pub pricing: ActorRef<PricingActor>,
    pub trip_ledger: ActorRef<TripLedgerActor>,
    pub stream_bus: ActorRef<StreamBusActor>,
    pub reservations: Arc<ReservationStore<DriverId>>,
    pub reject_history: Arc<Mutex<HashMap<DriverId, chrono::DateTime<Utc>>>>,
    pub pending_offers: Arc<PendingOffers>,
}

const INITIAL_RADIUS_KM: f64 = 1.0;

/// Runs to completion: either the trip ends up `DriverAssigned` or `Failed`.
/// Cancellation at any suspension point clears whatever reservation is held
/// and returns without touching the Trip Aggregate further (§4.4 step 6).
pub async fn run(request: DispatchRequest, ctx: DispatchContext, cancel: CancellationToken) {
    let DispatchRequest {
        trip_id,
        pickup,
        vehicle_type,
        zone_geohash,
    } = request;

    let mut radius_km = INITIAL_RADIUS_KM;
    let mut accepted_driver: Option<(DriverId, model::driver::VehicleId)> = None;

    'attempts: for _attempt in 0..ctx.config.dispatch_max_attempts {
        if cancel.is_cancelled() {
            return;
        }
        radius_km = radius_km.min(ctx.config.max_search_radius_km);

        let candidates = match with_backoff(ctx.config.max_retries, || {
            ctx.geo.find_nearby(
                pickup,
                radius_km,
                Some(vec![vehicle_type]),
                true,
                Some(ctx.config.candidate_pool_size),
            )
        })
        .await
        {
            Ok(candidates) => candidates,
            Err(error) => {
                tracing::error!(?error, trip_id = %trip_id, "geo index unavailable during dispatch");
                break 'attempts;
            }
        };

        if !candidates.is_empty() {
            let radius_m = radius_km * 1000.0;
            let recently_rejected = ctx.reject_history.lock().unwrap().clone();
            let ranked = rank_candidates(
                candidates,
                radius_m,
                ctx.config.reject_penalty,
                &recently_rejected,
                Duration::seconds(ctx.config.reject_penalty_window_s as i64),
                ctx.clock.now(),
            );

            for (candidate, _score) in ranked {
                if cancel.is_cancelled() {
                    return;
                }

                let now = ctx.clock.now();
                let ttl = Duration::seconds(ctx.config.reservation_ttl_s as i64);
                if !ctx.reservations.try_reserve(candidate.driver_id, trip_id, ttl, now) {
                    continue;
                }

                let (tx, rx) = oneshot::channel();
                ctx.pending_offers
                    .lock()
                    .unwrap()
                    .insert((trip_id, candidate.driver_id), tx);

                let offer_event = TripUpdateEvent {
                    trip_id,
                    old_status: None,
                    new_status: TripStatus::Requested,
                    user_id: Some(candidate.driver_id.to_string()),
                    location_lat: Some(pickup.lat),
                    location_lon: Some(pickup.lon),
                    eta_s: None,
                    t: now,
                };
                let _ = ctx.stream_bus.publish(StreamItem::TripUpdate(offer_event)).await;

                let offer_timeout = std::time::Duration::from_secs(ctx.config.offer_timeout_s);
                let outcome = tokio::select! {
                    result = rx => result.ok(),
                    _ = tokio::time::sleep(offer_timeout) => None,
                    _ = cancel.cancelled() => {
                        ctx.pending_offers.lock().unwrap().remove(&(trip_id, candidate.driver_id));
                        ctx.reservations.release(&candidate.driver_id, trip_id);
                        return;
                    }
                };
                ctx.pending_offers.lock().unwrap().remove(&(trip_id, candidate.driver_id));

                match outcome {
                    Some(OfferOutcome::Accept) => {
                        accepted_driver = Some((candidate.driver_id, candidate.position.vehicle_id));
                        break 'attempts;
                    }
                    Some(OfferOutcome::Reject) => {
                        ctx.reservations.release(&candidate.driver_id, trip_id);
                        ctx.reject_history.lock().unwrap().insert(candidate.driver_id, now);
                    }
                    None => {
                        // offer timeout: treat like a reject for fairness purposes,
                        // but without penalizing a driver who never responded.
                        ctx.reservations.release(&candidate.driver_id, trip_id);
                    }
                }
            }
        }

        radius_km *= ctx.config.radius_expand_factor;
    }

    match accepted_driver {
        Some((driver_id, vehicle_id)) => {
            let assign = with_backoff(ctx.config.max_retries, || {
                ctx.trip_ledger.assign_driver(trip_id, driver_id, vehicle_id, None)
            })
            .await;
            match assign {
                Ok(_) => {
                    let _ = ctx.pricing.observe_demand(zone_geohash, vehicle_type, -1).await;
                }
                Err(error) => {
                    tracing::error!(?error, trip_id = %trip_id, "failed to commit driver assignment after accept");
                    ctx.reservations.release(&driver_id, trip_id);
                    let _ = ctx.trip_ledger.fail_trip(trip_id, "assignment_commit_failed".to_string()).await;
                }
            }
        }
        None => {
            let _ = ctx.trip_ledger.fail_trip(trip_id, "no_drivers".to_string()).await;
        }
    }
}
