use crate::{Access, GraphId, RoadClass, RoadUse, Surface};
use bitfield_struct::bitfield;
use enumset::EnumSet;
use zerocopy::{LE, U16, U32, U64};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, Unaligned};

/// Speed written by older tile writers when nothing better was known.
const DEFAULT_SPEED_KPH: u8 = 15;

/// Grade bucket meaning "flat" (and the fallback for unset grades).
const FLAT_GRADE: u8 = 7;

#[bitfield(u64,
    repr = U64<LE>,
    from = crate::endian::conv_u64le::from_inner,
    into = crate::endian::conv_u64le::into_inner
)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned)]
struct FirstBitfield {
    #[bits(46, from = crate::endian::conv_u64le::from_inner, into = crate::endian::conv_u64le::into_inner)]
    end_node: U64<LE>,
    #[bits(8)]
    restrictions: u8,
    #[bits(7)]
    opposing_edge_index: u8,
    // Booleans represented as single bits for infailability.
    // See the comment in node.rs for details.
    #[bits(1)]
    forward: u8,
    #[bits(1)]
    leaves_tile: u8,
    #[bits(1)]
    country_crossing: u8,
}

#[bitfield(u64,
    repr = U64<LE>,
    from = crate::endian::conv_u64le::from_inner,
    into = crate::endian::conv_u64le::into_inner
)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned)]
struct SpeedsBitfield {
    #[bits(8)]
    speed: u8,
    #[bits(8)]
    free_flow_speed: u8,
    #[bits(8)]
    constrained_flow_speed: u8,
    #[bits(8)]
    truck_speed: u8,
    #[bits(8)]
    name_consistency: u8,
    #[bits(6)]
    edge_use: u8,
    #[bits(4)]
    lane_count: u8,
    #[bits(4)]
    density: u8,
    #[bits(3)]
    classification: u8,
    #[bits(3)]
    surface: u8,
    #[bits(1)]
    toll: u8,
    #[bits(1)]
    roundabout: u8,
    #[bits(1)]
    truck_route: u8,
    #[bits(1)]
    has_predicted_speed: u8,
}

#[bitfield(u64,
    repr = U64<LE>,
    from = crate::endian::conv_u64le::from_inner,
    into = crate::endian::conv_u64le::into_inner
)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned)]
struct AccessBitfield {
    #[bits(12, from = crate::endian::conv_u16le::from_inner, into = crate::endian::conv_u16le::into_inner)]
    forward_access: U16<LE>,
    #[bits(12, from = crate::endian::conv_u16le::from_inner, into = crate::endian::conv_u16le::into_inner)]
    reverse_access: U16<LE>,
    #[bits(5)]
    max_up_slope: u8,
    #[bits(5)]
    max_down_slope: u8,
    #[bits(3)]
    sac_scale: u8,
    #[bits(2)]
    cycle_lane: u8,
    #[bits(1)]
    is_bike_network: u8,
    #[bits(1)]
    use_sidepath: u8,
    #[bits(1)]
    bicycle_dismount: u8,
    #[bits(1)]
    has_sidewalk_left: u8,
    #[bits(1)]
    has_sidewalk_right: u8,
    #[bits(1)]
    has_shoulder: u8,
    // Tunnel/bridge/signal and other flags the bicycle engine ignores.
    #[bits(16)]
    _flags: u32,
    #[bits(3)]
    _spare: u8,
}

#[bitfield(u64,
    repr = U64<LE>,
    from = crate::endian::conv_u64le::from_inner,
    into = crate::endian::conv_u64le::into_inner
)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned)]
struct GeometryBitfield {
    #[bits(24)]
    turn_type: u32,
    #[bits(8)]
    edge_to_left: u8,
    #[bits(24, from = crate::endian::conv_u32le::from_inner, into = crate::endian::conv_u32le::into_inner)]
    length: U32<LE>,
    #[bits(4)]
    weighted_grade: u8,
    #[bits(4)]
    curvature: u8,
}

/// A directed edge within the routing graph.
///
/// This struct contains only the essential edge information needed for
/// routing calculations; shape, names, and other descriptive data live in
/// variable-length sections after the edge array, which this engine never
/// reads.
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, Debug)]
#[repr(C)]
pub struct DirectedEdge {
    first_bitfield: FirstBitfield,
    /// Edge info offset and restriction masks; not used by the router.
    _edge_info_word: U64<LE>,
    speeds_bitfield: SpeedsBitfield,
    access_bitfield: AccessBitfield,
    geometry_bitfield: GeometryBitfield,
    /// Stop impact / transit line id; not used by the router.
    _stop_impact: U32<LE>,
    /// Local-level indexes and shortcut info; not used by the router.
    _local_level_info: U32<LE>,
}

impl DirectedEdge {
    /// The graph ID of the node this edge leads to.
    ///
    /// The embedded fields are only meaningful when the end level matches
    /// a searchable level and the referenced tile actually loads.
    #[inline]
    pub const fn end_node_id(&self) -> GraphId {
        // SAFETY: the field is limited to 46 bits.
        unsafe { GraphId::from_id_unchecked(self.first_bitfield.end_node().get()) }
    }

    /// Access mask in the edge's forward direction.
    #[inline]
    pub fn forward_access(&self) -> EnumSet<Access> {
        EnumSet::from_repr(self.access_bitfield.forward_access().get())
    }

    /// Access mask in the edge's reverse direction.
    #[inline]
    pub fn reverse_access(&self) -> EnumSet<Access> {
        EnumSet::from_repr(self.access_bitfield.reverse_access().get())
    }

    /// The union of forward and reverse access.
    ///
    /// Cycling treats edges as undirected (one can always walk a bike back
    /// along a one-way street), so traversal checks use the union.
    #[inline]
    pub fn access_union(&self) -> EnumSet<Access> {
        self.forward_access() | self.reverse_access()
    }

    /// Posted/estimated speed in km/h.
    ///
    /// Tiles written without speed data store zero; that decodes as the
    /// format's documented default of 15 km/h.
    #[inline]
    pub const fn speed_kph(&self) -> u8 {
        let raw = self.speeds_bitfield.speed();
        if raw == 0 { DEFAULT_SPEED_KPH } else { raw }
    }

    /// The way the edge is used.
    #[inline]
    pub const fn edge_use(&self) -> RoadUse {
        RoadUse::from_bits(self.speeds_bitfield.edge_use())
    }

    /// The number of lanes (zero decodes as one).
    #[inline]
    pub const fn lane_count(&self) -> u8 {
        let raw = self.speeds_bitfield.lane_count();
        if raw == 0 { 1 } else { raw }
    }

    /// The road classification.
    #[inline]
    pub const fn classification(&self) -> RoadClass {
        RoadClass::from_bits(self.speeds_bitfield.classification())
    }

    /// The surface quality.
    #[inline]
    pub const fn surface(&self) -> Surface {
        Surface::from_bits(self.speeds_bitfield.surface())
    }

    /// Cycle lane provision: 0 none, 1 shared, 2 dedicated, 3 separated.
    #[inline]
    pub const fn cycle_lane(&self) -> u8 {
        self.access_bitfield.cycle_lane()
    }

    /// Is this edge part of a signed bicycle network?
    #[inline]
    pub const fn is_bike_network(&self) -> bool {
        self.access_bitfield.is_bike_network() != 0
    }

    /// Is a parallel sidepath the preferred cycling route?
    #[inline]
    pub const fn uses_sidepath(&self) -> bool {
        self.access_bitfield.use_sidepath() != 0
    }

    /// Must cyclists dismount on this edge?
    #[inline]
    pub const fn requires_dismount(&self) -> bool {
        self.access_bitfield.bicycle_dismount() != 0
    }

    /// Does the edge have a usable shoulder?
    #[inline]
    pub const fn has_shoulder(&self) -> bool {
        self.access_bitfield.has_shoulder() != 0
    }

    /// Edge length in meters.
    #[inline]
    pub const fn length_m(&self) -> u32 {
        self.geometry_bitfield.length().get()
    }

    /// Weighted slope bucket, 0 (steep downhill) to 15 (steep uphill),
    /// 7 flat. Zero means "unset" on disk and decodes as flat.
    #[inline]
    pub const fn weighted_grade(&self) -> u8 {
        let raw = self.geometry_bitfield.weighted_grade();
        if raw == 0 { FLAT_GRADE } else { raw }
    }
}

pub(crate) fn assemble_directed_edge(attributes: &super::builder::EdgeSpec) -> DirectedEdge {
    DirectedEdge {
        first_bitfield: FirstBitfield::new()
            .with_end_node(U64::new(attributes.end_node.value())),
        _edge_info_word: U64::new(0),
        speeds_bitfield: SpeedsBitfield::new()
            .with_speed(attributes.speed_kph)
            .with_edge_use(attributes.road_use.into_bits())
            .with_lane_count(attributes.lane_count)
            .with_classification(attributes.classification.discriminant())
            .with_surface(attributes.surface.discriminant()),
        access_bitfield: AccessBitfield::new()
            .with_forward_access(U16::new(attributes.forward_access.as_repr()))
            .with_reverse_access(U16::new(attributes.reverse_access.as_repr()))
            .with_cycle_lane(attributes.cycle_lane)
            .with_is_bike_network(u8::from(attributes.bike_network))
            .with_use_sidepath(u8::from(attributes.use_sidepath))
            .with_bicycle_dismount(u8::from(attributes.dismount))
            .with_has_shoulder(u8::from(attributes.shoulder)),
        geometry_bitfield: GeometryBitfield::new()
            .with_length(U32::new(attributes.length_m))
            .with_weighted_grade(attributes.weighted_grade),
        _stop_impact: U32::new(0),
        _local_level_info: U32::new(0),
    }
}
