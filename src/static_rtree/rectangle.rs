//! Integer minimum bounding rectangles and the distance bounds that drive
//! the best-first search.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::coordinate::{FixedPointCoordinate, COORDINATE_PRECISION};

/// An axis-aligned bounding rectangle in fixed-point coordinates, inclusive
/// on all four sides.
///
/// A freshly constructed rectangle carries the empty sentinel (min at
/// `i32::MAX`, max at `i32::MIN`); the first merge or extension replaces it.
/// Field order matches the on-disk node record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct RectangleInt2D {
    pub min_lon: i32,
    pub max_lon: i32,
    pub min_lat: i32,
    pub max_lat: i32,
}

impl Default for RectangleInt2D {
    fn default() -> Self {
        RectangleInt2D {
            min_lon: i32::MAX,
            max_lon: i32::MIN,
            min_lat: i32::MAX,
            max_lat: i32::MIN,
        }
    }
}

impl std::fmt::Display for RectangleInt2D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{} {},{}",
            self.min_lat as f64 / COORDINATE_PRECISION,
            self.min_lon as f64 / COORDINATE_PRECISION,
            self.max_lat as f64 / COORDINATE_PRECISION,
            self.max_lon as f64 / COORDINATE_PRECISION
        )
    }
}

impl RectangleInt2D {
    /// Size of one rectangle on the wire, in bytes.
    pub const ENCODED_SIZE: usize = 16;

    /// Grows the rectangle to cover `other`.
    pub fn merge(&mut self, other: &RectangleInt2D) {
        self.min_lon = self.min_lon.min(other.min_lon);
        self.max_lon = self.max_lon.max(other.max_lon);
        self.min_lat = self.min_lat.min(other.min_lat);
        self.max_lat = self.max_lat.max(other.max_lat);
    }

    /// Grows the rectangle to cover a single coordinate.
    pub fn extend_with(&mut self, coordinate: FixedPointCoordinate) {
        self.min_lon = self.min_lon.min(coordinate.lon);
        self.max_lon = self.max_lon.max(coordinate.lon);
        self.min_lat = self.min_lat.min(coordinate.lat);
        self.max_lat = self.max_lat.max(coordinate.lat);
    }

    /// Inclusive containment on all four sides.
    pub fn contains(&self, location: FixedPointCoordinate) -> bool {
        let lats_contained = location.lat >= self.min_lat && location.lat <= self.max_lat;
        let lons_contained = location.lon >= self.min_lon && location.lon <= self.max_lon;
        lats_contained && lons_contained
    }

    /// Non-empty overlap of two closed rectangles.
    pub fn intersects(&self, other: &RectangleInt2D) -> bool {
        self.min_lon <= other.max_lon
            && self.max_lon >= other.min_lon
            && self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
    }

    /// Integer midpoint of the rectangle, truncating.
    pub fn centroid(&self) -> FixedPointCoordinate {
        FixedPointCoordinate::new(
            ((self.min_lat as i64 + self.max_lat as i64) / 2) as i32,
            ((self.min_lon as i64 + self.max_lon as i64) / 2) as i32,
        )
    }

    /// True once at least one coordinate has been merged in.
    pub fn is_valid(&self) -> bool {
        self.min_lon <= self.max_lon && self.min_lat <= self.max_lat
    }

    /// MINDIST: distance from `location` to the nearest point of the
    /// rectangle, zero when contained.
    ///
    /// Classifies the location against the nine regions around the rectangle
    /// and measures to the matching side or corner.
    pub fn min_dist(&self, location: FixedPointCoordinate) -> f32 {
        if self.contains(location) {
            return 0.0;
        }

        let north = location.lat > self.max_lat;
        let south = location.lat < self.min_lat;
        let east = location.lon > self.max_lon;
        let west = location.lon < self.min_lon;

        let nearest = match (north, south, east, west) {
            (true, _, false, false) => FixedPointCoordinate::new(self.max_lat, location.lon),
            (_, true, false, false) => FixedPointCoordinate::new(self.min_lat, location.lon),
            (false, false, true, _) => FixedPointCoordinate::new(location.lat, self.max_lon),
            (false, false, _, true) => FixedPointCoordinate::new(location.lat, self.min_lon),
            (true, _, true, _) => FixedPointCoordinate::new(self.max_lat, self.max_lon),
            (true, _, _, true) => FixedPointCoordinate::new(self.max_lat, self.min_lon),
            (_, true, true, _) => FixedPointCoordinate::new(self.min_lat, self.max_lon),
            (_, true, _, true) => FixedPointCoordinate::new(self.min_lat, self.min_lon),
            (false, false, false, false) => unreachable!("location not contained"),
        };

        FixedPointCoordinate::approx_euclidean_distance(location, nearest)
    }

    /// MINMAXDIST of Roussopoulos: the minimum over the four sides of the
    /// larger of the two side-endpoint distances.
    ///
    /// For a true minimum bounding rectangle this is a tight upper bound on
    /// the distance to the nearest object that must exist inside.
    pub fn min_max_dist(&self, location: FixedPointCoordinate) -> f32 {
        let upper_left = FixedPointCoordinate::new(self.max_lat, self.min_lon);
        let upper_right = FixedPointCoordinate::new(self.max_lat, self.max_lon);
        let lower_right = FixedPointCoordinate::new(self.min_lat, self.max_lon);
        let lower_left = FixedPointCoordinate::new(self.min_lat, self.min_lon);

        let d = |corner| FixedPointCoordinate::approx_euclidean_distance(location, corner);

        let mut min_max_dist = f32::MAX;
        min_max_dist = min_max_dist.min(d(upper_left).max(d(upper_right)));
        min_max_dist = min_max_dist.min(d(upper_right).max(d(lower_right)));
        min_max_dist = min_max_dist.min(d(lower_right).max(d(lower_left)));
        min_max_dist = min_max_dist.min(d(lower_left).max(d(upper_left)));
        min_max_dist
    }

    pub(crate) fn write_to(&self, mut wtr: impl Write) -> std::io::Result<()> {
        wtr.write_i32::<LittleEndian>(self.min_lon)?;
        wtr.write_i32::<LittleEndian>(self.max_lon)?;
        wtr.write_i32::<LittleEndian>(self.min_lat)?;
        wtr.write_i32::<LittleEndian>(self.max_lat)?;
        Ok(())
    }

    pub(crate) fn from_reader(mut rdr: impl Read) -> std::io::Result<Self> {
        Ok(RectangleInt2D {
            min_lon: rdr.read_i32::<LittleEndian>()?,
            max_lon: rdr.read_i32::<LittleEndian>()?,
            min_lat: rdr.read_i32::<LittleEndian>()?,
            max_lat: rdr.read_i32::<LittleEndian>()?,
        })
    }
}
