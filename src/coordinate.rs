//! Fixed-point geographic coordinates and the planar distance helpers the
//! index is built on.
//!
//! Coordinates are stored as degrees scaled by [`COORDINATE_PRECISION`] in
//! 32-bit integers, which keeps tree nodes and leaf records compact and makes
//! equality exact. All distances returned here are a flat-earth approximation
//! in metres: fast, deterministic, and consistent between the rectangle
//! bounds and the per-segment measurements, which is what the pruning rules
//! of the search need. They are not geodesic distances.

/// Scale factor between degrees and the fixed-point integer representation.
pub const COORDINATE_PRECISION: f64 = 1_000_000.0;

/// Mean earth radius in metres used by the flat-earth approximation.
const EARTH_RADIUS: f32 = 6_372_797.560_856;

/// A geographic coordinate in fixed-point degrees (degrees × 10⁶).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FixedPointCoordinate {
    pub lat: i32,
    pub lon: i32,
}

impl FixedPointCoordinate {
    pub fn new(lat: i32, lon: i32) -> Self {
        Self { lat, lon }
    }

    /// Planar distance in metres between two coordinates.
    ///
    /// Longitude differences are scaled by the cosine of the mean latitude,
    /// then the Euclidean norm is taken. Non-negative and finite for any
    /// finite input.
    pub fn approx_euclidean_distance(a: FixedPointCoordinate, b: FixedPointCoordinate) -> f32 {
        const DEG_TO_RAD: f32 = 0.017_453_292_5;

        let lat1 = (a.lat as f32 / COORDINATE_PRECISION as f32) * DEG_TO_RAD;
        let lon1 = (a.lon as f32 / COORDINATE_PRECISION as f32) * DEG_TO_RAD;
        let lat2 = (b.lat as f32 / COORDINATE_PRECISION as f32) * DEG_TO_RAD;
        let lon2 = (b.lon as f32 / COORDINATE_PRECISION as f32) * DEG_TO_RAD;

        let x = (lon2 - lon1) * ((lat1 + lat2) / 2.0).cos();
        let y = lat2 - lat1;
        (x * x + y * y).sqrt() * EARTH_RADIUS
    }
}

impl std::fmt::Display for FixedPointCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({},{})",
            self.lat as f64 / COORDINATE_PRECISION,
            self.lon as f64 / COORDINATE_PRECISION
        )
    }
}

/// Web-Mercator forward projection: latitude in degrees to projected y in
/// degree-compatible units.
pub fn lat_to_mercator_y(lat: f64) -> f64 {
    180.0 / std::f64::consts::PI
        * ((std::f64::consts::PI / 4.0 + lat * std::f64::consts::PI / 360.0).tan()).ln()
}

/// Inverse of [`lat_to_mercator_y`].
pub fn mercator_y_to_lat(y: f64) -> f64 {
    180.0 / std::f64::consts::PI
        * (2.0 * (y * std::f64::consts::PI / 180.0).exp().atan() - std::f64::consts::PI / 2.0)
}

/// Result of projecting a query point onto a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Planar distance from the query point to the foot point.
    pub distance: f32,
    /// Projection of the query point onto the segment, clamped to the
    /// endpoints.
    pub foot: FixedPointCoordinate,
    /// Parameter of the foot point along the segment, in [0, 1].
    pub ratio: f32,
}

/// Projects `point` onto the segment from `source` to `target`.
///
/// The projection runs in (Mercator-y, longitude) space so that the foot
/// point lands where the segment actually passes on a map. The parameter is
/// clamped to [0, 1]; a degenerate segment (`source == target`) yields ratio
/// 0 with the foot at `source`. The returned distance is measured with
/// [`FixedPointCoordinate::approx_euclidean_distance`].
pub fn perpendicular_distance(
    source: FixedPointCoordinate,
    target: FixedPointCoordinate,
    point: FixedPointCoordinate,
) -> Projection {
    let ax = lat_to_mercator_y(source.lat as f64 / COORDINATE_PRECISION);
    let ay = source.lon as f64 / COORDINATE_PRECISION;
    let bx = lat_to_mercator_y(target.lat as f64 / COORDINATE_PRECISION);
    let by = target.lon as f64 / COORDINATE_PRECISION;
    let px = lat_to_mercator_y(point.lat as f64 / COORDINATE_PRECISION);
    let py = point.lon as f64 / COORDINATE_PRECISION;

    let dx = bx - ax;
    let dy = by - ay;
    let squared_length = dx * dx + dy * dy;

    let mut ratio = if squared_length <= f64::EPSILON {
        0.0
    } else {
        ((px - ax) * dx + (py - ay) * dy) / squared_length
    };
    if ratio < 0.0 {
        ratio = 0.0;
    } else if ratio > 1.0 {
        ratio = 1.0;
    }

    let foot = if ratio <= 0.0 {
        source
    } else if ratio >= 1.0 {
        target
    } else {
        FixedPointCoordinate::new(
            (mercator_y_to_lat(ax + ratio * dx) * COORDINATE_PRECISION) as i32,
            ((ay + ratio * dy) * COORDINATE_PRECISION) as i32,
        )
    };

    Projection {
        distance: FixedPointCoordinate::approx_euclidean_distance(point, foot),
        foot,
        ratio: ratio as f32,
    }
}

/// Tolerance-based equality for the planar distances used throughout the
/// queries; avoids oscillation between candidates that only differ by
/// floating-point rounding.
pub fn epsilon_equal(a: f32, b: f32) -> bool {
    (a - b).abs() <= f32::EPSILON
}
