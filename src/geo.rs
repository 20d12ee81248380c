//! Great-circle distance and bearing on a spherical Earth

/// Mean Earth radius in meters (IUGG)
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance between two coordinates in meters.
///
/// Haversine formula on the mean Earth radius. Symmetric and non-negative;
/// zero (modulo floating error) for identical coordinates.
pub fn earth_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
}

/// Great-circle distance plus initial bearing from the first coordinate
/// to the second.
///
/// The bearing is in radians, normalized to `[0, 2π)`, and `None` when the
/// two coordinates coincide (bearing is undefined at zero distance).
pub fn earth_distance_and_bearing(
    lat1: f64,
    lon1: f64,
    lat2: f64,
    lon2: f64,
) -> (f64, Option<f64>) {
    let distance = earth_distance(lat1, lon1, lat2, lon2);

    if lat1 == lat2 && lon1 == lon2 {
        return (distance, None);
    }

    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let y = dlambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlambda.cos();
    let bearing = y.atan2(x).rem_euclid(std::f64::consts::TAU);

    (distance, Some(bearing))
}
