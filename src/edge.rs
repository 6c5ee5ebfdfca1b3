//! The segment payload record stored in leaf pages.
//!
//! The index treats most of this record as opaque routing metadata that is
//! handed back verbatim in query results; the only fields it interprets are
//! the endpoint indices `u`/`v` and the `is_in_tiny_cc` component tag.
//! Records have a fixed little-endian wire encoding so that leaf pages keep
//! a constant stride on disk.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::coordinate::FixedPointCoordinate;

/// Sentinel for an absent edge-based node id.
pub const SPECIAL_NODEID: u32 = u32::MAX;

/// Travel mode tag carried through to phantom nodes.
pub type TravelMode = u8;

/// Travel mode value meaning "not traversable in this direction".
pub const TRAVEL_MODE_INACCESSIBLE: TravelMode = 0;

/// A directed road segment between two entries of the external coordinate
/// table, plus the routing metadata returned with query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeData {
    /// Index of the start coordinate in the external coordinate table.
    pub u: u32,
    /// Index of the end coordinate in the external coordinate table.
    pub v: u32,
    pub forward_edge_based_node_id: u32,
    pub reverse_edge_based_node_id: u32,
    pub name_id: u32,
    pub forward_weight: i32,
    pub reverse_weight: i32,
    pub forward_offset: i32,
    pub reverse_offset: i32,
    pub packed_geometry_id: u32,
    pub fwd_segment_position: u16,
    pub forward_travel_mode: TravelMode,
    pub backward_travel_mode: TravelMode,
    /// Set when the segment belongs to a tiny connected component; such
    /// segments are filtered out at low zoom levels.
    pub is_in_tiny_cc: bool,
}

impl EdgeData {
    /// Size of one record on the wire, in bytes.
    pub const ENCODED_SIZE: usize = 45;

    /// Integer midpoint of the two endpoint coordinates.
    pub fn centroid(a: FixedPointCoordinate, b: FixedPointCoordinate) -> FixedPointCoordinate {
        FixedPointCoordinate::new(
            ((a.lat as i64 + b.lat as i64) / 2) as i32,
            ((a.lon as i64 + b.lon as i64) / 2) as i32,
        )
    }

    pub fn write_to(&self, mut wtr: impl Write) -> std::io::Result<()> {
        wtr.write_u32::<LittleEndian>(self.u)?;
        wtr.write_u32::<LittleEndian>(self.v)?;
        wtr.write_u32::<LittleEndian>(self.forward_edge_based_node_id)?;
        wtr.write_u32::<LittleEndian>(self.reverse_edge_based_node_id)?;
        wtr.write_u32::<LittleEndian>(self.name_id)?;
        wtr.write_i32::<LittleEndian>(self.forward_weight)?;
        wtr.write_i32::<LittleEndian>(self.reverse_weight)?;
        wtr.write_i32::<LittleEndian>(self.forward_offset)?;
        wtr.write_i32::<LittleEndian>(self.reverse_offset)?;
        wtr.write_u32::<LittleEndian>(self.packed_geometry_id)?;
        wtr.write_u16::<LittleEndian>(self.fwd_segment_position)?;
        wtr.write_u8(self.forward_travel_mode)?;
        wtr.write_u8(self.backward_travel_mode)?;
        wtr.write_u8(self.is_in_tiny_cc as u8)?;
        Ok(())
    }

    pub fn from_reader(mut rdr: impl Read) -> std::io::Result<Self> {
        Ok(EdgeData {
            u: rdr.read_u32::<LittleEndian>()?,
            v: rdr.read_u32::<LittleEndian>()?,
            forward_edge_based_node_id: rdr.read_u32::<LittleEndian>()?,
            reverse_edge_based_node_id: rdr.read_u32::<LittleEndian>()?,
            name_id: rdr.read_u32::<LittleEndian>()?,
            forward_weight: rdr.read_i32::<LittleEndian>()?,
            reverse_weight: rdr.read_i32::<LittleEndian>()?,
            forward_offset: rdr.read_i32::<LittleEndian>()?,
            reverse_offset: rdr.read_i32::<LittleEndian>()?,
            packed_geometry_id: rdr.read_u32::<LittleEndian>()?,
            fwd_segment_position: rdr.read_u16::<LittleEndian>()?,
            forward_travel_mode: rdr.read_u8()?,
            backward_travel_mode: rdr.read_u8()?,
            is_in_tiny_cc: rdr.read_u8()? != 0,
        })
    }
}
