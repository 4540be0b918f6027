use crate::{Access, GraphId};
use bitfield_struct::bitfield;
use enumset::EnumSet;
use geo::{Coord, coord};
use zerocopy::{LE, U16, U32, U64};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, Unaligned};

#[bitfield(u64,
    repr = U64<LE>,
    from = crate::endian::conv_u64le::from_inner,
    into = crate::endian::conv_u64le::into_inner
)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned)]
struct FirstBitfield {
    #[bits(22, from = crate::endian::conv_u32le::from_inner, into = crate::endian::conv_u32le::into_inner)]
    lat_offset: U32<LE>,
    #[bits(4)]
    lat_offset7: u8,
    #[bits(22, from = crate::endian::conv_u32le::from_inner, into = crate::endian::conv_u32le::into_inner)]
    lon_offset: U32<LE>,
    #[bits(4)]
    lon_offset7: u8,
    #[bits(12, from = crate::endian::conv_u16le::from_inner, into = crate::endian::conv_u16le::into_inner)]
    access: U16<LE>,
}

#[bitfield(u64,
    repr = U64<LE>,
    from = crate::endian::conv_u64le::from_inner,
    into = crate::endian::conv_u64le::into_inner
)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned)]
struct SecondBitfield {
    #[bits(21, from = crate::endian::conv_u32le::from_inner, into = crate::endian::conv_u32le::into_inner)]
    edge_index: U32<LE>,
    #[bits(7)]
    edge_count: u8,
    // Admin index, time zone, intersection type, and density live here;
    // the cost model never reads them.
    #[bits(36, from = crate::endian::conv_u64le::from_inner, into = crate::endian::conv_u64le::into_inner)]
    #[allow(dead_code)]
    spare: U64<LE>,
}

/// Information for a node within the graph.
///
/// The graph uses a forward star structure: nodes point to the first
/// outbound directed edge, and each directed edge points to the end node
/// of the edge.
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, Debug, Clone)]
#[repr(C)]
pub struct NodeInfo {
    first_bit_field: FirstBitfield,
    second_bit_field: SecondBitfield,
    /// Transition index/count, driveability, and elevation; opaque here.
    _attributes: U64<LE>,
    /// Headings of up to 8 local edges, rounded to 2 degrees.
    _headings: U64<LE>,
}

impl NodeInfo {
    /// Gets the coordinate of the node.
    ///
    /// The position is stored as a pair of offsets (microdegrees plus a
    /// tenth-of-a-microdegree refinement) from the tile's SW corner, so a
    /// reference coordinate is required to compute the absolute position.
    /// Tile corners are multiples of the tile size, which f32 represents
    /// exactly; the offset math is done in f64 to keep full precision.
    #[inline]
    pub fn coordinate(&self, sw_corner: Coord<f32>) -> Coord<f64> {
        let lat_offset = f64::from(self.first_bit_field.lat_offset().get()) * 1e-6f64
            + f64::from(self.first_bit_field.lat_offset7()) * 1e-7f64;
        let lon_offset = f64::from(self.first_bit_field.lon_offset().get()) * 1e-6f64
            + f64::from(self.first_bit_field.lon_offset7()) * 1e-7f64;
        coord! {
            x: f64::from(sw_corner.x) + lon_offset,
            y: f64::from(sw_corner.y) + lat_offset,
        }
    }

    /// The access mask for this node.
    #[inline]
    pub fn access(&self) -> EnumSet<Access> {
        // The access bits are length 12 and the enum has 12 variants,
        // so every representable pattern is valid.
        EnumSet::from_repr(self.first_bit_field.access().get())
    }

    /// The index within the node's tile of its first outbound directed edge.
    #[inline]
    pub const fn edge_index(&self) -> u32 {
        self.second_bit_field.edge_index().get()
    }

    /// The number of outbound edges (on this level).
    #[inline]
    pub const fn edge_count(&self) -> u8 {
        self.second_bit_field.edge_count()
    }
}

/// Encodes an absolute coordinate as tile-corner-relative offsets.
///
/// Used by the tile builder; panics (via `debug_assert`) only if the
/// coordinate lies outside the tile, which the builder checks first.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn offset_components(absolute: f64, base: f32) -> (u32, u8) {
    let tenths = ((absolute - f64::from(base)) * 1e7).round() as u64;
    ((tenths / 10) as u32, (tenths % 10) as u8)
}

pub(crate) fn assemble_node(
    coordinate: Coord<f64>,
    sw_corner: Coord<f32>,
    access: EnumSet<Access>,
    edge_index: u32,
    edge_count: u8,
) -> NodeInfo {
    let (lat_offset, lat_offset7) = offset_components(coordinate.y, sw_corner.y);
    let (lon_offset, lon_offset7) = offset_components(coordinate.x, sw_corner.x);
    NodeInfo {
        first_bit_field: FirstBitfield::new()
            .with_lat_offset(U32::new(lat_offset))
            .with_lat_offset7(lat_offset7)
            .with_lon_offset(U32::new(lon_offset))
            .with_lon_offset7(lon_offset7)
            .with_access(U16::new(access.as_repr())),
        second_bit_field: SecondBitfield::new()
            .with_edge_index(U32::new(edge_index))
            .with_edge_count(edge_count),
        _attributes: U64::new(0),
        _headings: U64::new(0),
    }
}

// NOTE: Booleans in these bit fields are represented as single-bit u8
// rather than bool, because bool does not implement `FromBytes`. A single
// bit can never contain an invalid bool pattern, so the accessors compare
// against zero instead.

#[bitfield(u64,
    repr = U64<LE>,
    from = crate::endian::conv_u64le::from_inner,
    into = crate::endian::conv_u64le::into_inner
)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned)]
pub struct NodeTransition {
    #[bits(46, from = crate::endian::conv_u64le::from_inner, into = crate::endian::conv_u64le::into_inner)]
    end_node_id: U64<LE>,
    #[bits(1)]
    up: u8,
    #[bits(17)]
    _spare: u32,
}

impl NodeTransition {
    /// The ID of the corresponding end node on another hierarchy level.
    #[inline]
    pub const fn corresponding_end_node_id(&self) -> GraphId {
        // SAFETY: the field is limited to 46 bits.
        unsafe { GraphId::from_id_unchecked(self.end_node_id().get()) }
    }

    /// Is the transition up to a higher (coarser) level?
    #[inline]
    pub const fn is_up(&self) -> bool {
        self.up() != 0
    }
}

pub(crate) fn assemble_transition(end_node: GraphId, up: bool) -> NodeTransition {
    NodeTransition::new()
        .with_end_node_id(U64::new(end_node.value()))
        .with_up(u8::from(up))
}
