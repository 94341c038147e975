//! Candidate scoring and ordering (§4.4 step 2, "Ordering & fairness").

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use model::driver::{DriverId, DriverStatus, NearbyDriver};

/// `score = 0.4*distance_score + 0.3*rating_score + 0.3*availability_score`,
/// with a flat penalty subtracted for drivers who rejected within the
/// configured window (never below zero).
pub fn score_candidate(candidate: &NearbyDriver, radius_m: f64, reject_penalty: f64, penalized: bool) -> f64 {
    let distance_score = (1.0 - candidate.distance_from_center_m / radius_m.max(1.0)).max(0.0);
    let rating_score = (candidate.position.rating / 5.0).clamp(0.0, 1.0);
    let availability_score = if candidate.position.status == DriverStatus::Online { 1.0 } else { 0.0 };
    let raw = 0.4 * distance_score + 0.3 * rating_score + 0.3 * availability_score;
    if penalized {
        (raw - reject_penalty).max(0.0)
    } else {
        raw
    }
}

/// Sorts candidates by score descending; ties broken by lower distance, then
/// higher rating, then lexicographic `driver_id` (§4.4 step 2).
pub fn rank_candidates(
    mut candidates: Vec<NearbyDriver>,
    radius_m: f64,
    reject_penalty: f64,
    recently_rejected: &HashMap<DriverId, DateTime<Utc>>,
    window: Duration,
    now: DateTime<Utc>,
) -> Vec<(NearbyDriver, f64)> {
    let mut scored: Vec<(NearbyDriver, f64)> = candidates
        .drain(..)
        .map(|candidate| {
            let penalized = recently_rejected
                .get(&candidate.driver_id)
                .map(|rejected_at| now - *rejected_at < window)
                .unwrap_or(false);
            let score = score_candidate(&candidate, radius_m, reject_penalty, penalized);
            (candidate, score)
        })
        .collect();

    scored.sort_by(|(a_pos, a_score), (b_pos, b_score)| {
        b_score
            .partial_cmp(a_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                a_pos
                    .distance_from_center_m
                    .partial_cmp(&b_pos.distance_from_center_m)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| b_pos.position.rating.partial_cmp(&a_pos.position.rating).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a_pos.driver_id.to_string().cmp(&b_pos.driver_id.to_string()))
    });
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use model::driver::{DriverPosition, VehicleType};
    use model::location::Location;
    use utility::id::Id;
    use uuid::Uuid;

    fn nearby(rating: f64, distance_m: f64, status: DriverStatus) -> NearbyDriver {
        let now = Utc::now();
        NearbyDriver {
            driver_id: Id::new(Uuid::new_v4()),
            position: DriverPosition::new(
                Id::new(Uuid::new_v4()),
                Id::new(Uuid::new_v4()),
                Location::new(40.0, -74.0, 5.0, now).unwrap(),
                status,
                VehicleType::Sedan,
                rating,
                now,
                Duration::seconds(300),
            ),
            distance_from_center_m: distance_m,
        }
    }

    #[test]
    fn closer_higher_rated_driver_scores_higher() {
        let a = nearby(4.9, 300.0, DriverStatus::Online);
        let b = nearby(4.2, 900.0, DriverStatus::Online);
        let score_a = score_candidate(&a, 2000.0, 0.1, false);
        let score_b = score_candidate(&b, 2000.0, 0.1, false);
        assert!(score_a > score_b);
    }

    #[test]
    fn reject_penalty_never_drives_score_negative() {
        let driver = nearby(1.0, 1999.0, DriverStatus::Busy);
        let score = score_candidate(&driver, 2000.0, 10.0, true);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn ranking_breaks_ties_by_distance_then_rating_then_id() {
        let a = nearby(4.0, 500.0, DriverStatus::Online);
        let b = nearby(4.0, 500.0, DriverStatus::Online);
        let ranked = rank_candidates(vec![a.clone(), b.clone()], 2000.0, 0.1, &HashMap::new(), Duration::seconds(60), Utc::now());
        assert_eq!(ranked.len(), 2);
        assert!(ranked[0].1 >= ranked[1].1);
    }
}
