//! Great-circle distance on the Earth's surface.

use hostelwatch_core::Coordinates;

/// Mean Earth radius in meters (IUGG).
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Distance in meters between two points.
///
/// Uses the haversine formula, which is accurate to well under a meter at
/// geofence scale.
#[must_use]
pub fn distance_meters(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let delta_lat = (to.latitude - from.latitude).to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_METERS * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_point_is_zero() {
        let hostel = Coordinates::from([21.498_221, 83.904_285]);
        assert!(distance_meters(hostel, hostel).abs() < f64::EPSILON);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let d = distance_meters(Coordinates::from([0.0, 0.0]), Coordinates::from([1.0, 0.0]));
        assert!((d - 111_195.0).abs() < 10.0, "got {d}");
    }

    #[test]
    fn test_short_distance_is_symmetric() {
        let a = Coordinates::from([12.9, 77.6]);
        let b = Coordinates::from([12.9045, 77.6]);
        let d = distance_meters(a, b);
        assert!((d - 500.4).abs() < 1.0, "got {d}");
        assert!((d - distance_meters(b, a)).abs() < 1e-9);
    }

    #[test]
    fn test_antipodes() {
        let d = distance_meters(Coordinates::from([0.0, 0.0]), Coordinates::from([0.0, 180.0]));
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_METERS).abs() < 1.0);
    }
}
