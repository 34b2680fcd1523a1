//! Great-circle course and distance between two positions.
//!
//! Inputs and outputs are `f32` like the rest of the tracker; the
//! trigonometry runs in `f64`.

use std::f64::consts::PI;

use fm_types::Coords2D;

/// Nautical miles per radian of arc.
const NM_PER_RADIAN: f64 = (180.0 * 60.0) / PI;

const METERS_PER_NM: f64 = 1852.0;

/// Returns the initial bearing in degrees `[0, 360)` and the distance in
/// meters from point 1 to point 2. Coordinates are decimal degrees.
///
/// Identical points yield a distance of zero and a bearing of zero.
pub fn bearing_and_distance(lat1: f32, lon1: f32, lat2: f32, lon2: f32) -> (f32, f32) {
    let lat1 = f64::from(lat1).to_radians();
    let lon1 = f64::from(lon1).to_radians();
    let lat2 = f64::from(lat2).to_radians();
    let lon2 = f64::from(lon2).to_radians();

    // haversine
    let p1 = ((lat1 - lat2) / 2.0).sin();
    let p2 = lat1.cos() * lat2.cos();
    let p3 = ((lon2 - lon1) / 2.0).sin();
    let h = (p1 * p1 + p2 * p3 * p3).clamp(0.0, 1.0);
    let d = 2.0 * h.sqrt().asin();

    let distance = d * NM_PER_RADIAN * METERS_PER_NM;

    let y = (lon2 - lon1).sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * (lon2 - lon1).cos();
    let course = y.atan2(x);
    let mut bearing = (course % (2.0 * PI)).to_degrees();
    if bearing < 0.0 {
        bearing += 360.0;
    }

    // values a hair under 360 round up when narrowed
    let bearing = bearing as f32;
    let bearing = if bearing >= 360.0 { 0.0 } else { bearing };

    (bearing, distance as f32)
}

/// [`bearing_and_distance`] from `from` to `to`.
pub fn bearing_and_distance_between(from: Coords2D, to: Coords2D) -> (f32, f32) {
    bearing_and_distance(from.latitude, from.longitude, to.latitude, to.longitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{algorithm::haversine_distance::HaversineDistance, Point};
    use proptest::prelude::*;

    #[test]
    fn identical_points() {
        assert_eq!(bearing_and_distance(0.0, 0.0, 0.0, 0.0), (0.0, 0.0));

        let (bearing, distance) = bearing_and_distance(51.5, -0.12, 51.5, -0.12);
        assert_eq!(distance, 0.0);
        assert!(!bearing.is_nan());
    }

    #[test]
    fn one_degree_of_latitude_at_the_equator() {
        let (bearing, distance) = bearing_and_distance(0.0, 0.0, 1.0, 0.0);
        assert_eq!(bearing, 0.0);
        assert!((distance - 111_120.0).abs() < 1.0, "distance = {distance}");

        let (bearing, distance) = bearing_and_distance(1.0, 0.0, 0.0, 0.0);
        assert!((bearing - 180.0).abs() < 1e-4, "bearing = {bearing}");
        assert!((distance - 111_120.0).abs() < 1.0, "distance = {distance}");
    }

    #[test]
    fn cardinal_directions() {
        let (east, _) = bearing_and_distance(0.0, 0.0, 0.0, 0.001);
        let (west, _) = bearing_and_distance(0.0, 0.0, 0.0, -0.001);

        assert!((east - 90.0).abs() < 1e-3, "east = {east}");
        assert!((west - 270.0).abs() < 1e-3, "west = {west}");
    }

    #[test]
    fn short_distances_keep_metre_precision() {
        // ~50 m north of a point in the mid latitudes
        let lat = 50.912_3_f32;
        let lon = -1.405_6_f32;
        let (bearing, distance) = bearing_and_distance(lat, lon, lat + 0.00045, lon);

        assert!((distance - 50.0).abs() < 1.0, "distance = {distance}");
        assert!(bearing < 0.5 || bearing > 359.5, "bearing = {bearing}");
    }

    #[test]
    fn agrees_with_geo_haversine() {
        let cases = [
            (50.91, -1.40, 50.92, -1.38),
            (-33.86, 151.21, -33.87, 151.20),
            (40.0, -74.0, 51.5, -0.12),
        ];

        for (lat1, lon1, lat2, lon2) in cases {
            let (_, distance) = bearing_and_distance(lat1, lon1, lat2, lon2);

            let expected = Point::new(f64::from(lon1), f64::from(lat1))
                .haversine_distance(&Point::new(f64::from(lon2), f64::from(lat2)));

            // geo uses the mean earth radius, we use the nautical mile
            let error = (f64::from(distance) - expected).abs() / expected;
            assert!(error < 1e-3, "{distance} vs {expected}");
        }
    }

    #[test]
    fn antipodes_do_not_produce_nan() {
        let (bearing, distance) = bearing_and_distance(0.0, 0.0, 0.0, 180.0);
        assert!(!bearing.is_nan());
        assert!((distance - 20_001_600.0).abs() < 10.0, "distance = {distance}");
    }

    proptest! {
        #[test]
        fn bearing_is_always_in_range(
            lat1 in -90.0f32..=90.0,
            lon1 in -180.0f32..=180.0,
            lat2 in -90.0f32..=90.0,
            lon2 in -180.0f32..=180.0,
        ) {
            let (bearing, distance) = bearing_and_distance(lat1, lon1, lat2, lon2);

            prop_assert!((0.0..360.0).contains(&bearing), "bearing = {}", bearing);
            prop_assert!(distance >= 0.0);
            prop_assert!(distance.is_finite());
        }
    }
}
