use serde::{Deserialize, Serialize};

/// Every knob listed in §6 "Configuration", threaded through every
/// component at startup rather than read from globals — mirrors the
/// design note that global state is eliminated in favor of a startup
/// struct passed to each component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub max_search_radius_km: f64,
    pub default_search_limit: usize,
    pub max_search_limit: usize,
    pub geohash_precision: usize,
    pub offer_timeout_s: u64,
    pub reservation_ttl_s: u64,
    pub dispatch_max_attempts: u32,
    pub radius_expand_factor: f64,
    pub reject_penalty: f64,
    pub reject_penalty_window_s: u64,
    pub surge_max: f64,
    pub surge_recompute_interval_s: u64,
    pub subscription_queue_capacity: usize,
    pub slow_consumer_drop_threshold: u64,
    pub heartbeat_interval_s: u64,
    pub event_snapshot_interval: u64,
    pub position_ttl_s: u64,
    pub max_retries: u32,
    pub shutdown_grace_s: u64,
    pub candidate_pool_size: usize,
    pub eta_waypoint_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_search_radius_km: 50.0,
            default_search_limit: 100,
            max_search_limit: 500,
            geohash_precision: 7,
            offer_timeout_s: 20,
            reservation_ttl_s: 30,
            dispatch_max_attempts: 3,
            radius_expand_factor: 2.0,
            reject_penalty: 0.1,
            reject_penalty_window_s: 60,
            surge_max: 5.0,
            surge_recompute_interval_s: 30,
            subscription_queue_capacity: 256,
            slow_consumer_drop_threshold: 64,
            heartbeat_interval_s: 30,
            event_snapshot_interval: 100,
            position_ttl_s: 300,
            max_retries: 3,
            shutdown_grace_s: 30,
            candidate_pool_size: 20,
            eta_waypoint_count: 5,
        }
    }
}

impl Config {
    /// Overlays values found in the environment (`RIDE_<FIELD>` in
    /// upper-snake-case) onto the defaults, in the style of the corpus's
    /// `DatabaseConnectionInfo::from_env`. Malformed values are ignored and
    /// fall back to the default rather than failing startup.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        macro_rules! overlay {
            ($field:ident, $env_key:literal) => {
                if let Ok(raw) = std::env::var($env_key) {
                    if let Ok(parsed) = raw.parse() {
                        config.$field = parsed;
                    }
                }
            };
        }

        overlay!(max_search_radius_km, "RIDE_MAX_SEARCH_RADIUS_KM");
        overlay!(default_search_limit, "RIDE_DEFAULT_SEARCH_LIMIT");
        overlay!(max_search_limit, "RIDE_MAX_SEARCH_LIMIT");
        overlay!(geohash_precision, "RIDE_GEOHASH_PRECISION");
        overlay!(offer_timeout_s, "RIDE_OFFER_TIMEOUT_S");
        overlay!(reservation_ttl_s, "RIDE_RESERVATION_TTL_S");
        overlay!(dispatch_max_attempts, "RIDE_DISPATCH_MAX_ATTEMPTS");
        overlay!(radius_expand_factor, "RIDE_RADIUS_EXPAND_FACTOR");
        overlay!(reject_penalty, "RIDE_REJECT_PENALTY");
        overlay!(reject_penalty_window_s, "RIDE_REJECT_PENALTY_WINDOW_S");
        overlay!(surge_max, "RIDE_SURGE_MAX");
        overlay!(surge_recompute_interval_s, "RIDE_SURGE_RECOMPUTE_INTERVAL_S");
        overlay!(subscription_queue_capacity, "RIDE_SUBSCRIPTION_QUEUE_CAPACITY");
        overlay!(slow_consumer_drop_threshold, "RIDE_SLOW_CONSUMER_DROP_THRESHOLD");
        overlay!(heartbeat_interval_s, "RIDE_HEARTBEAT_INTERVAL_S");
        overlay!(event_snapshot_interval, "RIDE_EVENT_SNAPSHOT_INTERVAL");
        overlay!(position_ttl_s, "RIDE_POSITION_TTL_S");
        overlay!(max_retries, "RIDE_MAX_RETRIES");
        overlay!(shutdown_grace_s, "RIDE_SHUTDOWN_GRACE_S");
        overlay!(candidate_pool_size, "RIDE_CANDIDATE_POOL_SIZE");
        overlay!(eta_waypoint_count, "RIDE_ETA_WAYPOINT_COUNT");

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_expected_values() {
        let config = Config::default();
        assert_eq!(config.max_search_radius_km, 50.0);
        assert_eq!(config.default_search_limit, 100);
        assert_eq!(config.geohash_precision, 7);
        assert_eq!(config.offer_timeout_s, 20);
        assert_eq!(config.reservation_ttl_s, 30);
        assert_eq!(config.dispatch_max_attempts, 3);
        assert_eq!(config.surge_max, 5.0);
        assert_eq!(config.subscription_queue_capacity, 256);
        assert_eq!(config.slow_consumer_drop_threshold, 64);
        assert_eq!(config.heartbeat_interval_s, 30);
        assert_eq!(config.position_ttl_s, 300);
    }

    #[test]
    fn env_overlay_parses_valid_values() {
        std::env::set_var("RIDE_SURGE_MAX", "4.2");
        let config = Config::from_env();
        assert_eq!(config.surge_max, 4.2);
        std::env::remove_var("RIDE_SURGE_MAX");
    }
}
