//! Phantom nodes: virtual graph nodes placed at the foot point of a matched
//! segment, carrying the segment's routing metadata with the forward and
//! reverse weights split at the foot point.

use crate::coordinate::FixedPointCoordinate;
use crate::edge::{EdgeData, TravelMode, SPECIAL_NODEID};

/// Query result anchored on a road segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhantomNode {
    pub forward_node_id: u32,
    pub reverse_node_id: u32,
    pub name_id: u32,
    pub forward_weight: i32,
    pub reverse_weight: i32,
    pub forward_offset: i32,
    pub reverse_offset: i32,
    pub packed_geometry_id: u32,
    /// Foot point of the query location on the matched segment.
    pub location: FixedPointCoordinate,
    pub fwd_segment_position: u16,
    pub forward_travel_mode: TravelMode,
    pub backward_travel_mode: TravelMode,
}

impl PhantomNode {
    /// Builds a phantom node from a matched segment and its foot point.
    pub(crate) fn from_segment(edge: &EdgeData, location: FixedPointCoordinate) -> Self {
        PhantomNode {
            forward_node_id: edge.forward_edge_based_node_id,
            reverse_node_id: edge.reverse_edge_based_node_id,
            name_id: edge.name_id,
            forward_weight: edge.forward_weight,
            reverse_weight: edge.reverse_weight,
            forward_offset: edge.forward_offset,
            reverse_offset: edge.reverse_offset,
            packed_geometry_id: edge.packed_geometry_id,
            location,
            fwd_segment_position: edge.fwd_segment_position,
            forward_travel_mode: edge.forward_travel_mode,
            backward_travel_mode: edge.backward_travel_mode,
        }
    }

    /// Snaps the foot point onto the input coordinate when they differ by
    /// exactly one fixed-point unit on an axis.
    ///
    /// Repeated queries for the same location would otherwise wander by one
    /// ulp and return physically indistinguishable but unequal coordinates.
    /// Running the fix-up twice yields the same coordinate as running it
    /// once.
    pub(crate) fn snap_to_input(&mut self, input: FixedPointCoordinate) {
        if (input.lon as i64 - self.location.lon as i64).abs() == 1 {
            self.location.lon = input.lon;
        }
        if (input.lat as i64 - self.location.lat as i64).abs() == 1 {
            self.location.lat = input.lat;
        }
    }

    /// Splits the traversal weights at the foot point.
    ///
    /// `ratio` is the fraction of the segment between `u` and the foot
    /// point; the forward weight is scaled by it and the reverse weight by
    /// its complement. Sentinel node ids keep their weight untouched.
    pub(crate) fn split_weights(&mut self, u: FixedPointCoordinate, v: FixedPointCoordinate) {
        let distance_to_foot = FixedPointCoordinate::approx_euclidean_distance(u, self.location);
        let segment_length = FixedPointCoordinate::approx_euclidean_distance(u, v);
        let ratio = if segment_length > 0.0 {
            (distance_to_foot / segment_length).min(1.0)
        } else {
            0.0
        };

        if self.forward_node_id != SPECIAL_NODEID {
            self.forward_weight = (self.forward_weight as f32 * ratio) as i32;
        }
        if self.reverse_node_id != SPECIAL_NODEID {
            self.reverse_weight = (self.reverse_weight as f32 * (1.0 - ratio)) as i32;
        }
    }
}
