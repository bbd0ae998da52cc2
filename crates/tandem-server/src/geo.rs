//! Great-circle distance for proximity matching.

use tandem_proto::Coordinates;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points, in kilometres.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let lat_cos = a.latitude.to_radians().cos() * b.latitude.to_radians().cos();
    let h = (d_lat / 2.0).sin().powi(2) + lat_cos * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_is_zero() {
        let p = Coordinates::new(52.52, 13.405);
        assert!(haversine_km(p, p).abs() < 1e-9);
    }

    #[test]
    fn berlin_to_paris() {
        let berlin = Coordinates::new(52.52, 13.405);
        let paris = Coordinates::new(48.8566, 2.3522);
        let d = haversine_km(berlin, paris);
        assert!((870.0..890.0).contains(&d), "got {d}");
    }

    #[test]
    fn symmetric() {
        let a = Coordinates::new(-33.87, 151.21);
        let b = Coordinates::new(35.68, 139.69);
        assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-6);
    }

    #[test]
    fn antipodes_are_half_circumference() {
        let d = haversine_km(Coordinates::new(0.0, 0.0), Coordinates::new(0.0, 180.0));
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }
}
