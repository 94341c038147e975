use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use model::config::Config;
use model::error::CoreError;
use model::event::{TripEvent, TripEventPayload};
use model::subscription::{StreamItem, TripUpdateEvent};
use model::trip::{Trip, TripId, TripStatus};
use model::transitions;
use uuid::Uuid;

use actors::actor::{Actor, SupervisionStrategy};
use actors::actor_ref::ActorRef;
use actors::handler::Handler;
use stream_bus::actor::StreamBusActor;
use stream_bus::StreamBusRef;
use utility::clock::Clock;

use crate::messages::{
    Append, AssignDriver, CancelTrip, ChangeStatus, CompleteTrip, DropSnapshots, FailTrip, Load,
    Rebuild, RequestTrip, StartTrip,
};
use crate::projection;

/// Owns the append-only event log (§4.3), keyed by `trip_id`. A handler
/// panic resumes with the log intact — restarting would wipe every trip's
/// history over a single bad message, the one thing this component must
/// never do.
pub struct TripLedgerActor {
    events: HashMap<TripId, Vec<TripEvent>>,
    snapshots: HashMap<TripId, (u64, Trip)>,
    config: Config,
    clock: Arc<dyn Clock>,
    stream_bus: Option<ActorRef<StreamBusActor>>,
}

impl TripLedgerActor {
    pub fn new(config: Config, clock: Arc<dyn Clock>, stream_bus: Option<ActorRef<StreamBusActor>>) -> Self {
        Self {
            events: HashMap::new(),
            snapshots: HashMap::new(),
            config,
            clock,
            stream_bus,
        }
    }

    fn current_version(&self, trip_id: TripId) -> u64 {
        self.events.get(&trip_id).map(|v| v.len() as u64).unwrap_or(0)
    }

    fn current_projection(&self, trip_id: TripId) -> Option<Trip> {
        let log = self.events.get(&trip_id)?;
        match self.snapshots.get(&trip_id) {
            Some((version, snapshot)) if (*version as usize) <= log.len() => {
                Some(projection::rebuild_from_snapshot(snapshot.clone(), &log[*version as usize..]))
            }
            _ => projection::rebuild(log),
        }
    }

    fn maybe_snapshot(&mut self, trip_id: TripId) {
        let interval = self.config.event_snapshot_interval.max(1);
        let version = self.current_version(trip_id);
        if version > 0 && version % interval == 0 {
            if let Some(trip) = projection::rebuild(self.events.get(&trip_id).unwrap()) {
                self.snapshots.insert(trip_id, (version, trip));
            }
        }
    }

    /// Validates and appends one batch, all-or-nothing: if any payload in
    /// the batch would make an illegal transition against the state that
    /// precedes it (including earlier payloads in the same batch), nothing
    /// is persisted (§5: partial event batch never committed).
    fn append_batch(
        &mut self,
        trip_id: TripId,
        payloads: Vec<(TripEventPayload, Option<String>, serde_json::Value)>,
        expected_version: u64,
    ) -> Result<Vec<TripEvent>, CoreError> {
        let actual_version = self.current_version(trip_id);
        if actual_version != expected_version {
            return Err(CoreError::ConcurrencyConflict {
                trip_id: trip_id.to_string(),
                expected_version,
                found_version: actual_version,
            });
        }

        let mut scratch = self.current_projection(trip_id);
        let now = self.clock.now();
        let mut built = Vec::with_capacity(payloads.len());

        for (i, (payload, user_id, metadata)) in payloads.into_iter().enumerate() {
            if let Some(transition) = transition_of(&payload) {
                match &scratch {
                    Some(trip) if !transitions::is_allowed(trip.status, transition) => {
                        return Err(CoreError::InvalidStateTransition {
                            from: format!("{:?}", trip.status),
                            to: format!("{:?}", transition),
                        });
                    }
                    None if !matches!(payload, TripEventPayload::TripRequested { .. }) => {
                        return Err(CoreError::not_found(trip_id.to_string()));
                    }
                    _ => {}
                }
            }
            validate_preconditions(&scratch, &payload)?;

            let event = TripEvent {
                event_id: Uuid::new_v4(),
                trip_id,
                version: expected_version + i as u64 + 1,
                payload,
                user_id,
                t: now,
                metadata,
            };

            scratch = Some(match scratch {
                None => projection::initial(&event).ok_or_else(|| {
                    CoreError::Internal("first event of a new trip must be trip_requested".into())
                })?,
                Some(mut trip) => {
                    projection::apply(&mut trip, &event);
                    trip
                }
            });
            built.push(event);
        }

        self.events.entry(trip_id).or_default().extend(built.clone());
        self.maybe_snapshot(trip_id);
        Ok(built)
    }

    async fn publish_update(&self, before: Option<&Trip>, after: &Trip) {
        let Some(bus) = &self.stream_bus else { return };
        let last_location = after.actual_route.last();
        let event = TripUpdateEvent {
            trip_id: after.trip_id,
            old_status: before.map(|t| t.status),
            new_status: after.status,
            user_id: Some(after.rider_id.to_string()),
            location_lat: last_location.map(|l| l.lat),
            location_lon: last_location.map(|l| l.lon),
            eta_s: None,
            t: self.clock.now(),
        };
        let _ = bus.publish(StreamItem::TripUpdate(event)).await;

        if let Some(driver_id) = after.driver_id {
            let driver_event = TripUpdateEvent {
                trip_id: after.trip_id,
                old_status: before.map(|t| t.status),
                new_status: after.status,
                user_id: Some(driver_id.to_string()),
                location_lat: last_location.map(|l| l.lat),
                location_lon: last_location.map(|l| l.lon),
                eta_s: None,
                t: self.clock.now(),
            };
            let _ = bus.publish(StreamItem::TripUpdate(driver_event)).await;
        }
    }
}

/// The status a payload drives the projection to, for pre-append transition
/// validation. `None` for payloads that don't themselves carry a status
/// (there are none currently, but keeps the match exhaustive and future
/// payloads opt in explicitly).
fn transition_of(payload: &TripEventPayload) -> Option<TripStatus> {
    match payload {
        TripEventPayload::DriverAssigned { .. } => Some(TripStatus::DriverAssigned),
        TripEventPayload::StatusChanged { new, .. } => Some(*new),
        TripEventPayload::TripStarted { .. } => Some(TripStatus::TripStarted),
        TripEventPayload::TripCompleted { .. } => Some(TripStatus::Completed),
        TripEventPayload::TripCancelled { .. } => Some(TripStatus::Cancelled),
        TripEventPayload::TripRequested { .. } | TripEventPayload::Unknown => None,
    }
}

fn validate_preconditions(current: &Option<Trip>, payload: &TripEventPayload) -> Result<(), CoreError> {
    match payload {
        TripEventPayload::TripStarted { .. } => {
            let trip = current
                .as_ref()
                .ok_or_else(|| CoreError::invalid_argument("trip must exist before it can start"))?;
            if trip.driver_id.is_none() {
                return Err(CoreError::invalid_argument("trip_started requires an assigned driver"));
            }
        }
        TripEventPayload::TripCompleted { .. } => {
            let trip = current
                .as_ref()
                .ok_or_else(|| CoreError::invalid_argument("trip must exist before it can complete"))?;
            if trip.started_at.is_none() {
                return Err(CoreError::invalid_argument("trip_completed requires started_at to be set"));
            }
        }
        _ => {}
    }
    Ok(())
}

impl Actor for TripLedgerActor {
    fn on_fail(&mut self, error: Box<dyn Any + Send>) -> SupervisionStrategy {
        tracing::error!(?error, "trip ledger handler panicked, resuming with existing event log");
        SupervisionStrategy::Resume
    }
}

#[async_trait]
impl Handler<Append> for TripLedgerActor {
    async fn handle(&mut self, msg: Append) -> Result<Vec<TripEvent>, CoreError> {
        let before = self.current_projection(msg.trip_id);
        let payloads = msg
            .events
            .into_iter()
            .map(|p| (p.payload, p.user_id, p.metadata))
            .collect();
        let appended = self.append_batch(msg.trip_id, payloads, msg.expected_version)?;
        if let Some(after) = self.current_projection(msg.trip_id) {
            self.publish_update(before.as_ref(), &after).await;
        }
        Ok(appended)
    }
}

#[async_trait]
impl Handler<Load> for TripLedgerActor {
    async fn handle(&mut self, msg: Load) -> Result<Vec<TripEvent>, CoreError> {
        self.events
            .get(&msg.trip_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(msg.trip_id.to_string()))
    }
}

#[async_trait]
impl Handler<Rebuild> for TripLedgerActor {
    async fn handle(&mut self, msg: Rebuild) -> Result<Trip, CoreError> {
        self.current_projection(msg.trip_id)
            .ok_or_else(|| CoreError::not_found(msg.trip_id.to_string()))
    }
}

#[async_trait]
impl Handler<RequestTrip> for TripLedgerActor {
    async fn handle(&mut self, msg: RequestTrip) -> Result<Trip, CoreError> {
        let trip_id: TripId = utility::id::Id::new(Uuid::new_v4());
        let payload = TripEventPayload::TripRequested {
            rider_id: msg.rider_id,
            pickup: msg.pickup,
            destination: msg.destination,
            vehicle_type: msg.vehicle_type,
            passenger_count: msg.passenger_count,
            promo_code: msg.promo_code,
        };
        let appended = self.append_batch(
            trip_id,
            vec![(payload, msg.user_id, serde_json::Value::Null)],
            0,
        )?;
        let after = self.current_projection(trip_id).expect("just appended");
        self.publish_update(None, &after).await;
        debug_assert_eq!(appended.len(), 1);
        Ok(after)
    }
}

#[async_trait]
impl Handler<AssignDriver> for TripLedgerActor {
    async fn handle(&mut self, msg: AssignDriver) -> Result<Trip, CoreError> {
        let now = self.clock.now();
        let before = self.current_projection(msg.trip_id);
        let expected_version = self.current_version(msg.trip_id);
        let payloads = vec![
            (
                TripEventPayload::StatusChanged {
                    old: TripStatus::Requested,
                    new: TripStatus::Matched,
                    t: now,
                },
                msg.user_id.clone(),
                serde_json::Value::Null,
            ),
            (
                TripEventPayload::DriverAssigned {
                    driver_id: msg.driver_id,
                    vehicle_id: msg.vehicle_id,
                    t: now,
                },
                msg.user_id,
                serde_json::Value::Null,
            ),
        ];
        self.append_batch(msg.trip_id, payloads, expected_version)?;
        let after = self.current_projection(msg.trip_id).expect("just appended");
        self.publish_update(before.as_ref(), &after).await;
        Ok(after)
    }
}

#[async_trait]
impl Handler<ChangeStatus> for TripLedgerActor {
    async fn handle(&mut self, msg: ChangeStatus) -> Result<Trip, CoreError> {
        let now = self.clock.now();
        let before = self.current_projection(msg.trip_id);
        let old = before
            .as_ref()
            .map(|t| t.status)
            .ok_or_else(|| CoreError::not_found(msg.trip_id.to_string()))?;
        let expected_version = self.current_version(msg.trip_id);
        let payload = TripEventPayload::StatusChanged {
            old,
            new: msg.new_status,
            t: now,
        };
        self.append_batch(
            msg.trip_id,
            vec![(payload, msg.user_id, serde_json::Value::Null)],
            expected_version,
        )?;
        let after = self.current_projection(msg.trip_id).expect("just appended");
        self.publish_update(before.as_ref(), &after).await;
        Ok(after)
    }
}

#[async_trait]
impl Handler<StartTrip> for TripLedgerActor {
    async fn handle(&mut self, msg: StartTrip) -> Result<Trip, CoreError> {
        let now = self.clock.now();
        let before = self.current_projection(msg.trip_id);
        let expected_version = self.current_version(msg.trip_id);
        let payload = TripEventPayload::TripStarted {
            start_location: msg.start_location,
            t: now,
        };
        self.append_batch(
            msg.trip_id,
            vec![(payload, msg.user_id, serde_json::Value::Null)],
            expected_version,
        )?;
        let after = self.current_projection(msg.trip_id).expect("just appended");
        self.publish_update(before.as_ref(), &after).await;
        Ok(after)
    }
}

#[async_trait]
impl Handler<CompleteTrip> for TripLedgerActor {
    async fn handle(&mut self, msg: CompleteTrip) -> Result<Trip, CoreError> {
        let now = self.clock.now();
        let before = self.current_projection(msg.trip_id);
        let expected_version = self.current_version(msg.trip_id);
        let payload = TripEventPayload::TripCompleted {
            end_location: msg.end_location,
            final_fare_cents: msg.fare_actual_cents,
            t: now,
        };
        self.append_batch(
            msg.trip_id,
            vec![(payload, msg.user_id, serde_json::Value::Null)],
            expected_version,
        )?;
        let after = self.current_projection(msg.trip_id).expect("just appended");
        self.publish_update(before.as_ref(), &after).await;
        Ok(after)
    }
}

#[async_trait]
impl Handler<CancelTrip> for TripLedgerActor {
    async fn handle(&mut self, msg: CancelTrip) -> Result<Trip, CoreError> {
        let before = self
            .current_projection(msg.trip_id)
            .ok_or_else(|| CoreError::not_found(msg.trip_id.to_string()))?;

        // idempotent: already cancelled, return as-is without a second event.
        if before.status == TripStatus::Cancelled {
            return Ok(before);
        }
        if before.status.is_terminal() {
            return Err(CoreError::InvalidStateTransition {
                from: format!("{:?}", before.status),
                to: "Cancelled".to_string(),
            });
        }

        let now = self.clock.now();
        let expected_version = self.current_version(msg.trip_id);
        let payload = TripEventPayload::TripCancelled {
            cancelled_by: msg.cancelled_by,
            reason: msg.reason,
            t: now,
        };
        self.append_batch(
            msg.trip_id,
            vec![(payload, msg.user_id, serde_json::Value::Null)],
            expected_version,
        )?;
        let after = self.current_projection(msg.trip_id).expect("just appended");
        self.publish_update(Some(&before), &after).await;
        Ok(after)
    }
}

#[async_trait]
impl Handler<FailTrip> for TripLedgerActor {
    async fn handle(&mut self, msg: FailTrip) -> Result<Trip, CoreError> {
        let now = self.clock.now();
        let before = self.current_projection(msg.trip_id);
        let expected_version = self.current_version(msg.trip_id);
        let payload = TripEventPayload::StatusChanged {
            old: TripStatus::Requested,
            new: TripStatus::Failed,
            t: now,
        };
        let metadata = serde_json::json!({ "reason": msg.reason });
        self.append_batch(msg.trip_id, vec![(payload, None, metadata)], expected_version)?;
        let after = self.current_projection(msg.trip_id).expect("just appended");
        self.publish_update(before.as_ref(), &after).await;
        Ok(after)
    }
}

#[async_trait]
impl Handler<DropSnapshots> for TripLedgerActor {
    async fn handle(&mut self, _msg: DropSnapshots) {
        self.snapshots.clear();
    }
}
