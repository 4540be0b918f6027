//! # Spatial utilities useful for routing

use geo::Coord;

const METERS_PER_DEGREE_LAT: f64 = 111_132.954;

/// Fast distance approximation.
///
/// This is intended for cases when you need a _fast_ estimate over _short_
/// distances (up to a few kilometers), such as scanning every node in a
/// tile for the closest one. It trades trigonometry for a flat projection
/// centered on a reference point.
///
/// # Limitations
///
/// * Accuracy decreases at polar latitudes.
/// * Does NOT account for the antimeridian.
/// * Expected range of overestimation is less than 1m for short distances
///   (up to a few kilometers), but gets worse over larger distances and
///   closer to the poles.
pub struct DistanceApproximator {
    center: Coord<f64>,
    meters_per_lon_degree: f64,
    meters_per_lat_degree: f64,
}

impl DistanceApproximator {
    /// Create a new approximator centered on the given point.
    #[inline]
    pub fn new(center: Coord<f64>) -> Self {
        let lon_scale = center.y.to_radians().cos();
        Self {
            center,
            meters_per_lon_degree: lon_scale * METERS_PER_DEGREE_LAT,
            meters_per_lat_degree: METERS_PER_DEGREE_LAT,
        }
    }

    /// Returns an approximation of the **squared** distance in meters to
    /// the given point.
    ///
    /// Compare against `max_distance * max_distance` to avoid `sqrt` in
    /// the caller, or use
    /// [`DistanceApproximator::is_probably_within_distance_of`].
    #[inline]
    pub fn distance_squared(&self, other: Coord<f64>) -> f64 {
        let dlat = (other.y - self.center.y) * self.meters_per_lat_degree;
        let dlon = (other.x - self.center.x) * self.meters_per_lon_degree;
        (dlat * dlat) + (dlon * dlon)
    }

    /// Returns whether the other coordinate is *probably* within `meters`
    /// of the reference coordinate.
    ///
    /// See the [`DistanceApproximator`] docs for the limitations.
    #[inline]
    pub fn is_probably_within_distance_of(&self, other: Coord<f64>, meters: f64) -> bool {
        debug_assert!(
            meters < 20_000.0,
            "A distance threshold greater than 20km is not a great idea."
        );

        self.distance_squared(other) <= (meters * meters)
    }
}
