use crate::GraphId;
use bitfield_struct::bitfield;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use geo::{Coord, coord};
use std::borrow::Cow;
use zerocopy::{F32, LE, U32, U64};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, Unaligned};

/// The number of spatial bins in each graph tile.
const BIN_COUNT: usize = 25;

/// Remaining variable offset slots for format growth.
const EMPTY_SLOTS: usize = 11;

/// The number of UTF-8 bytes in the fixed size version field.
pub(crate) const VERSION_LEN: usize = 16;

/// The graph epoch: midnight Jan 1, 2014, Eastern Standard Time.
/// Tile creation dates are stored as days since this instant.
const GRAPH_EPOCH: DateTime<Utc> = DateTime::<FixedOffset>::from_naive_utc_and_offset(
    NaiveDateTime::new(
        NaiveDate::from_ymd_opt(2014, 1, 1).unwrap(),
        NaiveTime::from_num_seconds_from_midnight_opt(0, 0).unwrap(),
    ),
    FixedOffset::west_opt(5 * 3600).unwrap(),
)
.to_utc();

#[bitfield(u64,
    repr = U64<LE>,
    from = crate::endian::conv_u64le::from_inner,
    into = crate::endian::conv_u64le::into_inner
)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, PartialEq)]
struct FirstBitfield {
    #[bits(46, from = crate::endian::conv_u64le::from_inner, into = crate::endian::conv_u64le::into_inner)]
    graph_id: U64<LE>,
    #[bits(4)]
    density: u8,
    // Relative statistics (0 - 15); recorded by the tile writer but not
    // consulted by the router.
    #[bits(4)]
    name_quality: u8,
    #[bits(4)]
    speed_quality: u8,
    #[bits(4)]
    exit_quality: u8,
    // Booleans represented as single bits for infailability.
    // See the comment in node.rs for details.
    #[bits(1)]
    has_elevation: u8,
    #[bits(1)]
    has_ext_directed_edge: u8,
}

#[bitfield(u64,
    repr = U64<LE>,
    from = crate::endian::conv_u64le::from_inner,
    into = crate::endian::conv_u64le::into_inner
)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, PartialEq)]
struct SecondBitfield {
    #[bits(21, from = crate::endian::conv_u32le::from_inner, into = crate::endian::conv_u32le::into_inner)]
    node_count: U32<LE>,
    #[bits(21, from = crate::endian::conv_u32le::from_inner, into = crate::endian::conv_u32le::into_inner)]
    directed_edge_count: U32<LE>,
    #[bits(21, from = crate::endian::conv_u32le::from_inner, into = crate::endian::conv_u32le::into_inner)]
    predicted_speeds_count: U32<LE>,
    #[bits(1)]
    _spare: u8,
}

#[bitfield(u32,
    repr = U32<LE>,
    from = crate::endian::conv_u32le::from_inner,
    into = crate::endian::conv_u32le::into_inner
)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, PartialEq)]
struct TransitionCountBitfield {
    /// No, this is not a typo. This bit field has 22 bits: there can be up
    /// to twice as many transitions as nodes.
    #[bits(22, from = crate::endian::conv_u32le::from_inner, into = crate::endian::conv_u32le::into_inner)]
    transition_count: U32<LE>,
    #[bits(10)]
    _spare: u16,
}

/// Summary information about a graph tile.
///
/// Exactly 272 bytes. The router reads the graph ID, the SW corner, and
/// the node/edge/transition counts; the remaining fields are laid out in
/// full so offsets stay bit-exact with the tile writer.
#[derive(Clone, FromBytes, IntoBytes, Immutable, Unaligned, Debug, PartialEq)]
#[repr(C)]
pub struct GraphTileHeader {
    bit_field_1: FirstBitfield,
    base_lon_lat: [F32<LE>; 2],
    pub(crate) version: [u8; VERSION_LEN],
    /// The dataset ID (canonically, the last upstream changeset ID).
    pub dataset_id: U64<LE>,
    bit_field_2: SecondBitfield,
    transition_count_bitfield: TransitionCountBitfield,
    // Counts for sections the router skips entirely (turn lanes, transit
    // records, signs, access restrictions, admins).
    _turn_lane_count: U32<LE>,
    _transit_record_counts: U64<LE>,
    _misc_counts: [U64<LE>; 2],
    _reserved: [U64<LE>; 2],
    // Internal offsets sizing the variable-length sections that follow
    // the edge array. The router never seeks past the edges, but the
    // fields must exist for the header to be the right size.
    complex_restriction_forward_offset: U32<LE>,
    complex_restriction_reverse_offset: U32<LE>,
    edge_info_offset: U32<LE>,
    text_list_offset: U32<LE>,
    /// Days since [`GRAPH_EPOCH`], rounded down.
    create_date: U32<LE>,
    bin_offsets: [U32<LE>; BIN_COUNT],
    lane_connectivity_offset: U32<LE>,
    predicted_speeds_offset: U32<LE>,
    /// The size of the tile (in bytes).
    pub tile_size: U32<LE>,
    _empty_slots: [U32<LE>; EMPTY_SLOTS],
}

impl GraphTileHeader {
    /// The full graph ID of this tile.
    #[inline]
    pub const fn graph_id(&self) -> GraphId {
        // SAFETY: the bit field is limited to 46 bits, so the value cannot
        // exceed the max allowed.
        unsafe { GraphId::from_id_unchecked(self.bit_field_1.graph_id().get()) }
    }

    /// The relative road density within this tile (0-15).
    #[inline]
    pub const fn density(&self) -> u8 {
        self.bit_field_1.density()
    }

    /// The coordinate of the southwest corner of this graph tile.
    ///
    /// Node positions are stored as offsets from this corner.
    #[inline]
    pub const fn sw_corner(&self) -> Coord<f32> {
        coord! {x: self.base_lon_lat[0].get(), y: self.base_lon_lat[1].get()}
    }

    /// Gets the writer version used to generate this graph tile.
    pub fn version(&self) -> Cow<'_, str> {
        let null_index = self
            .version
            .iter()
            .position(|c| *c == 0)
            .unwrap_or(self.version.len());
        String::from_utf8_lossy(&self.version[0..null_index])
    }

    /// The number of nodes in this graph tile.
    #[inline]
    pub const fn node_count(&self) -> u32 {
        self.bit_field_2.node_count().get()
    }

    /// The number of directed edges in this graph tile.
    #[inline]
    pub const fn directed_edge_count(&self) -> u32 {
        self.bit_field_2.directed_edge_count().get()
    }

    /// The number of node transitions in this graph tile.
    #[inline]
    pub const fn transition_count(&self) -> u32 {
        self.transition_count_bitfield.transition_count().get()
    }

    /// The date this tile was created.
    #[inline]
    pub fn create_date(&self) -> DateTime<Utc> {
        GRAPH_EPOCH + TimeDelta::days(i64::from(self.create_date.get()))
    }
}

/// Constructs a fresh header for the tile builder.
///
/// Counts must already be within their bit-field ranges; the builder
/// validates them before calling this.
pub(crate) fn assemble_header(
    graph_id: GraphId,
    sw_corner: Coord<f32>,
    version: [u8; VERSION_LEN],
    dataset_id: u64,
    node_count: u32,
    directed_edge_count: u32,
    transition_count: u32,
    tile_size: u32,
) -> GraphTileHeader {
    GraphTileHeader {
        bit_field_1: FirstBitfield::new().with_graph_id(U64::new(graph_id.value())),
        base_lon_lat: [F32::new(sw_corner.x), F32::new(sw_corner.y)],
        version,
        dataset_id: U64::new(dataset_id),
        bit_field_2: SecondBitfield::new()
            .with_node_count(U32::new(node_count))
            .with_directed_edge_count(U32::new(directed_edge_count)),
        transition_count_bitfield: TransitionCountBitfield::new()
            .with_transition_count(U32::new(transition_count)),
        _turn_lane_count: U32::new(0),
        _transit_record_counts: U64::new(0),
        _misc_counts: [U64::new(0); 2],
        _reserved: [U64::new(0); 2],
        complex_restriction_forward_offset: U32::new(0),
        complex_restriction_reverse_offset: U32::new(0),
        edge_info_offset: U32::new(0),
        text_list_offset: U32::new(0),
        create_date: U32::new(0),
        bin_offsets: [U32::new(0); BIN_COUNT],
        lane_connectivity_offset: U32::new(0),
        predicted_speeds_offset: U32::new(0),
        tile_size: U32::new(tile_size),
        _empty_slots: [U32::new(0); EMPTY_SLOTS],
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_header_size() {
        // The on-disk header is exactly 272 bytes; everything after it is
        // computed relative to this.
        assert_eq!(size_of::<GraphTileHeader>(), 272);
    }

    #[test]
    fn test_assemble_round_trip() {
        let graph_id = GraphId::try_from_components(2, 795_665, 0).unwrap();
        let header = assemble_header(
            graph_id,
            coord! {x: 16.25f32, y: 48.0f32},
            *b"freewheel-0.1.0\0",
            42,
            3,
            7,
            1,
            272 + 3 * 32 + 8 + 7 * 48,
        );

        assert_eq!(header.graph_id(), graph_id);
        assert_eq!(header.node_count(), 3);
        assert_eq!(header.directed_edge_count(), 7);
        assert_eq!(header.transition_count(), 1);
        assert_eq!(header.version(), "freewheel-0.1.0");
        assert_eq!(header.sw_corner(), coord! {x: 16.25f32, y: 48.0f32});
    }
}
