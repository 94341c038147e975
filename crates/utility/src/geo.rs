//! Geospatial primitives shared by every component that reasons about
//! coordinates: great-circle distance, bearing, geohashing and the coarse
//! bounding-box prefilter used by `geo_index` before refining with exact
//! Haversine.

pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const EARTH_RADIUS_M: f64 = EARTH_RADIUS_KM * 1000.0;

const GEOHASH_ALPHABET: &[u8] = b"0123456789bcdefghjkmnpqrstuvwxyz";

fn to_radians(degrees: f64) -> f64 {
    degrees * std::f64::consts::PI / 180.0
}

fn to_degrees(radians: f64) -> f64 {
    radians * 180.0 / std::f64::consts::PI
}

/// Coarse lat/lon bounding box around `(lat, lon)` at the given radius, used
/// to cheaply narrow a geohash prefix search before exact refinement.
pub fn calculate_bounding_box(
    lat: f64,
    lon: f64,
    radius_km: f64,
) -> ((f64, f64), (f64, f64)) {
    let lat_rad = to_radians(lat);
    let lon_rad = to_radians(lon);

    let min_lat = lat_rad - radius_km / EARTH_RADIUS_KM;
    let max_lat = lat_rad + radius_km / EARTH_RADIUS_KM;

    let min_lon = lon_rad - radius_km / (EARTH_RADIUS_KM * lat_rad.cos());
    let max_lon = lon_rad + radius_km / (EARTH_RADIUS_KM * lat_rad.cos());

    (
        (to_degrees(min_lat), to_degrees(min_lon)),
        (to_degrees(max_lat), to_degrees(max_lon)),
    )
}

/// Great-circle distance in kilometers between two lat/lon points.
pub fn haversine_distance(
    latitude_1: f64,
    longitude_1: f64,
    latitude2: f64,
    longitude_2: f64,
) -> f64 {
    let lat1_rad = to_radians(latitude_1);
    let lon1_rad = to_radians(longitude_1);
    let lat2_rad = to_radians(latitude2);
    let lon2_rad = to_radians(longitude_2);

    let dlat = lat2_rad - lat1_rad;
    let dlon = lon2_rad - lon1_rad;

    let a = (dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Same as [`haversine_distance`] but in meters, the unit most operations in
/// this crate work in.
pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    haversine_distance(lat1, lon1, lat2, lon2) * 1000.0
}

/// Initial compass bearing in degrees `[0, 360)` from point 1 to point 2.
pub fn initial_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = to_radians(lat1);
    let lat2_rad = to_radians(lat2);
    let dlon_rad = to_radians(lon2 - lon1);

    let y = dlon_rad.sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * dlon_rad.cos();
    let bearing = to_degrees(y.atan2(x));

    (bearing + 360.0) % 360.0
}

/// Midpoint between two points along the great circle.
pub fn midpoint(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> (f64, f64) {
    let lat1_rad = to_radians(lat1);
    let lat2_rad = to_radians(lat2);
    let lon1_rad = to_radians(lon1);
    let dlon_rad = to_radians(lon2 - lon1);

    let bx = lat2_rad.cos() * dlon_rad.cos();
    let by = lat2_rad.cos() * dlon_rad.sin();

    let lat_mid = (lat1_rad.sin() + lat2_rad.sin())
        .atan2(((lat1_rad.cos() + bx).powi(2) + by.powi(2)).sqrt());
    let lon_mid = lon1_rad + by.atan2(lat1_rad.cos() + bx);

    (to_degrees(lat_mid), to_degrees(lon_mid))
}

/// Manhattan-style distance in meters: the sum of the Haversine distance
/// along each axis independently, holding the other coordinate fixed.
pub fn manhattan_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat_leg = haversine_distance_m(lat1, lon1, lat2, lon1);
    let lon_leg = haversine_distance_m(lat2, lon1, lat2, lon2);
    lat_leg + lon_leg
}

/// Straight-line distance in meters on an equirectangular projection
/// (cheap approximation, accurate only over short distances).
pub fn euclidean_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = to_radians(lat1);
    let lat2_rad = to_radians(lat2);
    let mean_lat = (lat1_rad + lat2_rad) / 2.0;

    let x = to_radians(lon2 - lon1) * mean_lat.cos();
    let y = to_radians(lat2 - lat1);

    EARTH_RADIUS_M * (x * x + y * y).sqrt()
}

/// Point at fraction `f` (0..=1) along the great circle from point 1 to
/// point 2, given the angular separation `angular_distance_rad` between
/// them. Used to generate ETA waypoints.
pub fn interpolate_great_circle(
    lat1: f64,
    lon1: f64,
    lat2: f64,
    lon2: f64,
    angular_distance_rad: f64,
    f: f64,
) -> (f64, f64) {
    if angular_distance_rad.abs() < 1e-12 {
        return (lat1, lon1);
    }

    let lat1_rad = to_radians(lat1);
    let lon1_rad = to_radians(lon1);
    let lat2_rad = to_radians(lat2);
    let lon2_rad = to_radians(lon2);

    let a = ((1.0 - f) * angular_distance_rad).sin() / angular_distance_rad.sin();
    let b = (f * angular_distance_rad).sin() / angular_distance_rad.sin();

    let x = a * lat1_rad.cos() * lon1_rad.cos() + b * lat2_rad.cos() * lon2_rad.cos();
    let y = a * lat1_rad.cos() * lon1_rad.sin() + b * lat2_rad.cos() * lon2_rad.sin();
    let z = a * lat1_rad.sin() + b * lat2_rad.sin();

    let lat_rad = z.atan2((x * x + y * y).sqrt());
    let lon_rad = y.atan2(x);

    (to_degrees(lat_rad), to_degrees(lon_rad))
}

/// Encodes `(lat, lon)` as a base-32 geohash string of the given precision
/// (number of characters, 1..=12). Bits are interleaved even=longitude,
/// odd=latitude, most significant bit first.
pub fn encode_geohash(lat: f64, lon: f64, precision: usize) -> String {
    let mut lat_range = (-90.0, 90.0);
    let mut lon_range = (-180.0, 180.0);
    let mut is_lon_bit = true;
    let mut bit = 0u8;
    let mut ch = 0usize;
    let mut out = String::with_capacity(precision);

    while out.len() < precision {
        if is_lon_bit {
            let mid = (lon_range.0 + lon_range.1) / 2.0;
            if lon >= mid {
                ch |= 1 << (4 - bit);
                lon_range.0 = mid;
            } else {
                lon_range.1 = mid;
            }
        } else {
            let mid = (lat_range.0 + lat_range.1) / 2.0;
            if lat >= mid {
                ch |= 1 << (4 - bit);
                lat_range.0 = mid;
            } else {
                lat_range.1 = mid;
            }
        }
        is_lon_bit = !is_lon_bit;

        if bit < 4 {
            bit += 1;
        } else {
            out.push(GEOHASH_ALPHABET[ch] as char);
            bit = 0;
            ch = 0;
        }
    }

    out
}

/// Decodes a geohash to the center point of its cell and the cell's
/// half-extents (lat, lon) in degrees.
pub fn decode_geohash(hash: &str) -> Option<((f64, f64), (f64, f64))> {
    let mut lat_range = (-90.0, 90.0);
    let mut lon_range = (-180.0, 180.0);
    let mut is_lon_bit = true;

    for c in hash.chars() {
        let idx = GEOHASH_ALPHABET.iter().position(|&b| b as char == c)?;
        for bit in (0..5).rev() {
            let mask = 1 << bit;
            let is_set = idx & mask != 0;
            if is_lon_bit {
                let mid = (lon_range.0 + lon_range.1) / 2.0;
                if is_set {
                    lon_range.0 = mid;
                } else {
                    lon_range.1 = mid;
                }
            } else {
                let mid = (lat_range.0 + lat_range.1) / 2.0;
                if is_set {
                    lat_range.0 = mid;
                } else {
                    lat_range.1 = mid;
                }
            }
            is_lon_bit = !is_lon_bit;
        }
    }

    let center_lat = (lat_range.0 + lat_range.1) / 2.0;
    let center_lon = (lon_range.0 + lon_range.1) / 2.0;
    let half_lat = (lat_range.1 - lat_range.0) / 2.0;
    let half_lon = (lon_range.1 - lon_range.0) / 2.0;

    Some(((center_lat, center_lon), (half_lat, half_lon)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_known_distance() {
        // NYC to London, ~5570km
        let dist = haversine_distance(40.7128, -74.0060, 51.5074, -0.1278);
        assert!((dist - 5570.0).abs() < 50.0);
    }

    #[test]
    fn haversine_same_point_is_zero() {
        assert!(haversine_distance(40.0, -74.0, 40.0, -74.0).abs() < 1e-9);
    }

    #[test]
    fn geohash_roundtrip_contains_point() {
        let lat = 40.7128;
        let lon = -74.0060;
        for precision in [1usize, 5, 7, 12] {
            let hash = encode_geohash(lat, lon, precision);
            assert_eq!(hash.len(), precision);
            let ((center_lat, center_lon), (half_lat, half_lon)) =
                decode_geohash(&hash).unwrap();
            assert!((lat - center_lat).abs() <= half_lat + 1e-9);
            assert!((lon - center_lon).abs() <= half_lon + 1e-9);
        }
    }

    #[test]
    fn bearing_due_east_is_90() {
        let bearing = initial_bearing(0.0, 0.0, 0.0, 10.0);
        assert!((bearing - 90.0).abs() < 0.5);
    }

    #[test]
    fn bearing_is_normalized() {
        let bearing = initial_bearing(10.0, 10.0, 0.0, 0.0);
        assert!((0.0..360.0).contains(&bearing));
    }

    #[test]
    fn interpolation_endpoints_match_inputs() {
        let (lat1, lon1) = (40.7128, -74.0060);
        let (lat2, lon2) = (40.7589, -73.9851);
        let angular = haversine_distance(lat1, lon1, lat2, lon2) / EARTH_RADIUS_KM;
        let (start_lat, start_lon) = interpolate_great_circle(lat1, lon1, lat2, lon2, angular, 0.0);
        let (end_lat, end_lon) = interpolate_great_circle(lat1, lon1, lat2, lon2, angular, 1.0);
        assert!((start_lat - lat1).abs() < 1e-6 && (start_lon - lon1).abs() < 1e-6);
        assert!((end_lat - lat2).abs() < 1e-6 && (end_lon - lon2).abs() < 1e-6);
    }
}
