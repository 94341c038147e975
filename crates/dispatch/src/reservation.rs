//! At-most-one-concurrent-reservation-per-driver (§4.4 step 3, §8 invariant
//! 3). A reservation older than its TTL is considered released on read
//! (fencing) — no separate sweeper needed, since the only readers are the
//! dispatch loops racing to acquire one.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use model::trip::TripId;

#[derive(Debug, Clone)]
struct Reservation {
    trip_id: TripId,
    expires_at: DateTime<Utc>,
}

pub struct ReservationStore<K> {
    entries: Mutex<HashMap<K, Reservation>>,
}

impl<K> Default for ReservationStore<K>
where
    K: std::hash::Hash + Eq,
{
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> ReservationStore<K>
where
    K: std::hash::Hash + Eq + Clone,
{
    /// Atomic compare-and-set: succeeds iff `key` has no live reservation.
    pub fn try_reserve(&self, key: K, trip_id: TripId, ttl: Duration, now: DateTime<Utc>) -> bool {
        let mut entries = self.entries.lock().unwrap();
        if let Some(existing) = entries.get(&key) {
            if existing.expires_at > now {
                return false;
            }
        }
        entries.insert(
            key,
            Reservation {
                trip_id,
                expires_at: now + ttl,
            },
        );
        true
    }

    /// Releases `key`'s reservation iff it's still held for `trip_id` — a
    /// reservation that already expired or was reassigned is left alone.
    pub fn release(&self, key: &K, trip_id: TripId) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(existing) = entries.get(key) {
            if existing.trip_id == trip_id {
                entries.remove(key);
            }
        }
    }

    /// Whether `key`'s reservation is currently live for `trip_id` — used to
    /// reject an `accept`/`reject` that arrives after TTL expiry.
    pub fn is_held_by(&self, key: &K, trip_id: TripId, now: DateTime<Utc>) -> bool {
        let entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(existing) => existing.trip_id == trip_id && existing.expires_at > now,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utility::id::Id;
    use uuid::Uuid;

    fn trip() -> TripId {
        Id::new(Uuid::new_v4())
    }

    #[test]
    fn second_reservation_fails_while_first_is_live() {
        let store: ReservationStore<u32> = ReservationStore::default();
        let now = Utc::now();
        assert!(store.try_reserve(1, trip(), Duration::seconds(30), now));
        assert!(!store.try_reserve(1, trip(), Duration::seconds(30), now));
    }

    #[test]
    fn reservation_can_be_reacquired_after_ttl_elapses() {
        let store: ReservationStore<u32> = ReservationStore::default();
        let now = Utc::now();
        assert!(store.try_reserve(1, trip(), Duration::seconds(30), now));
        let later = now + Duration::seconds(31);
        assert!(store.try_reserve(1, trip(), Duration::seconds(30), later));
    }

    #[test]
    fn release_only_clears_the_owning_trip() {
        let store: ReservationStore<u32> = ReservationStore::default();
        let now = Utc::now();
        let t1 = trip();
        let t2 = trip();
        store.try_reserve(1, t1, Duration::seconds(30), now);
        store.release(&1, t2);
        assert!(!store.try_reserve(1, t2, Duration::seconds(30), now));
        store.release(&1, t1);
        assert!(store.try_reserve(1, t2, Duration::seconds(30), now));
    }
}
