//! Folds `TripEvent`s into a `Trip` projection (§4.3). `apply` is total for
//! every known payload and idempotent: replaying the same prefix twice
//! yields the same struct both times, because it only ever copies fields
//! out of the event — it never reads `self` to decide what to write.

use model::event::{TripEvent, TripEventPayload};
use model::trip::{Trip, TripId, TripStatus};

/// Builds the initial projection from a trip's first event, which must be
/// `TripRequested`. Returns `None` for any other leading payload — the log
/// is malformed if a trip doesn't begin with its own request.
pub fn initial(event: &TripEvent) -> Option<Trip> {
    let TripEventPayload::TripRequested {
        rider_id,
        pickup,
        destination,
        vehicle_type,
        passenger_count,
        promo_code,
    } = &event.payload
    else {
        return None;
    };

    Some(Trip {
        trip_id: event.trip_id,
        rider_id: *rider_id,
        driver_id: None,
        vehicle_id: None,
        vehicle_type: *vehicle_type,
        pickup: *pickup,
        destination: *destination,
        actual_route: Vec::new(),
        status: TripStatus::Requested,
        fare_est_cents: None,
        fare_actual_cents: None,
        currency: "usd".to_string(),
        dist_est_km: None,
        dist_actual_km: None,
        dur_est_s: None,
        dur_actual_s: None,
        requested_at: event.t,
        matched_at: None,
        driver_assigned_at: None,
        driver_arrived_at: None,
        started_at: None,
        completed_at: None,
        cancelled_by: None,
        cancellation_reason: None,
        passenger_count: *passenger_count,
        promo_code: promo_code.clone(),
        version: event.version,
    })
}

/// Applies one event on top of an existing projection. Unknown payloads are
/// skipped — they never alter state (§4.3).
pub fn apply(trip: &mut Trip, event: &TripEvent) {
    match &event.payload {
        TripEventPayload::TripRequested { .. } => {
            // only valid as the first event; a duplicate mid-stream is a
            // logic error upstream, not something replay can correct, so it
            // is treated like any other unknown/no-op payload here.
        }
        TripEventPayload::DriverAssigned {
            driver_id,
            vehicle_id,
            t,
        } => {
            trip.driver_id = Some(*driver_id);
            trip.vehicle_id = Some(*vehicle_id);
            trip.driver_assigned_at = Some(*t);
            trip.status = TripStatus::DriverAssigned;
        }
        TripEventPayload::StatusChanged { new, t, .. } => {
            trip.status = *new;
            match new {
                TripStatus::Matched => trip.matched_at = Some(*t),
                TripStatus::DriverArrived => trip.driver_arrived_at = Some(*t),
                _ => {}
            }
        }
        TripEventPayload::TripStarted { start_location, t } => {
            trip.status = TripStatus::TripStarted;
            trip.actual_route = vec![*start_location];
            trip.started_at = Some(*t);
        }
        TripEventPayload::TripCompleted {
            end_location,
            final_fare_cents,
            t,
        } => {
            trip.status = TripStatus::Completed;
            trip.actual_route.push(*end_location);
            trip.completed_at = Some(*t);
            trip.dur_actual_s = trip.started_at.map(|started| (*t - started).num_seconds());
            if let Some(start) = trip.actual_route.first() {
                trip.dist_actual_km = Some(start.haversine_distance_m(end_location) / 1000.0);
            }
            if final_fare_cents.is_some() {
                trip.fare_actual_cents = *final_fare_cents;
            }
        }
        TripEventPayload::TripCancelled {
            cancelled_by,
            reason,
            ..
        } => {
            trip.status = TripStatus::Cancelled;
            trip.cancelled_by = Some(*cancelled_by);
            trip.cancellation_reason = reason.clone();
        }
        TripEventPayload::Unknown => {}
    }
    trip.version = event.version;
}

/// Folds a full event slice into a projection, or `None` for an empty slice.
pub fn rebuild(events: &[TripEvent]) -> Option<Trip> {
    let (first, rest) = events.split_first()?;
    let mut trip = initial(first)?;
    for event in rest {
        apply(&mut trip, event);
    }
    Some(trip)
}

/// Folds a tail of events onto a snapshot taken at `snapshot.version`, used
/// by `rebuild` as a performance shortcut. Never a correctness source: it
/// must produce the exact same result as folding the whole log (asserted by
/// the actor's tests).
pub fn rebuild_from_snapshot(mut trip: Trip, tail: &[TripEvent]) -> Trip {
    for event in tail {
        apply(&mut trip, event);
    }
    trip
}

pub fn trip_id_of(events: &[TripEvent]) -> Option<TripId> {
    events.first().map(|e| e.trip_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use model::location::Location;
    use model::trip::RiderId;
    use serde_json::Value;
    use utility::id::Id;
    use uuid::Uuid;

    fn loc(lat: f64, lon: f64) -> Location {
        Location::new(lat, lon, 5.0, Utc::now()).unwrap()
    }

    fn event(trip_id: TripId, version: u64, payload: TripEventPayload) -> TripEvent {
        TripEvent {
            event_id: Uuid::new_v4(),
            trip_id,
            version,
            payload,
            user_id: None,
            t: Utc::now(),
            metadata: Value::Null,
        }
    }

    #[test]
    fn replaying_same_prefix_is_idempotent() {
        let trip_id: TripId = Id::new(Uuid::new_v4());
        let rider_id: RiderId = Id::new(Uuid::new_v4());
        let events = vec![event(
            trip_id,
            1,
            TripEventPayload::TripRequested {
                rider_id,
                pickup: loc(40.0, -74.0),
                destination: loc(40.1, -74.1),
                vehicle_type: model::driver::VehicleType::Sedan,
                passenger_count: 1,
                promo_code: None,
            },
        )];

        let once = rebuild(&events).unwrap();
        let twice = rebuild(&[events.clone(), events].concat()[..1]).unwrap();
        assert_eq!(once.version, twice.version);
        assert_eq!(once.status, twice.status);
    }

    #[test]
    fn unknown_event_never_alters_state() {
        let trip_id: TripId = Id::new(Uuid::new_v4());
        let rider_id: RiderId = Id::new(Uuid::new_v4());
        let mut events = vec![event(
            trip_id,
            1,
            TripEventPayload::TripRequested {
                rider_id,
                pickup: loc(40.0, -74.0),
                destination: loc(40.1, -74.1),
                vehicle_type: model::driver::VehicleType::Sedan,
                passenger_count: 1,
                promo_code: None,
            },
        )];
        let before = rebuild(&events).unwrap();
        events.push(event(trip_id, 2, TripEventPayload::Unknown));
        let after = rebuild(&events).unwrap();
        assert_eq!(before.status, after.status);
        assert_eq!(after.version, 2);
    }
}
