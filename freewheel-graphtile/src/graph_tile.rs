//! Zero-copy views over a single graph tile.
//!
//! A tile is a contiguous byte buffer: a fixed 272-byte header, then the
//! node, transition, and directed edge arrays. Variable-length sections
//! (shape, names) follow the edges; this engine never reads them, so
//! trailing bytes are tolerated and ignored.

use thiserror::Error;
use zerocopy::{FromBytes, transmute};

use self_cell::self_cell;

mod builder;
mod directed_edge;
mod header;
mod node;

pub use crate::graph_id::{GraphId, InvalidGraphIdError};
pub use builder::{EdgeSpec, GraphTileBuildError, GraphTileBuilder};
pub use directed_edge::DirectedEdge;
pub use header::GraphTileHeader;
pub use node::{NodeInfo, NodeTransition};

#[derive(Debug, Error)]
pub enum GraphTileDecodingError {
    #[error("Unable to extract a slice of the correct length; the tile data is malformed.")]
    SliceArrayConversion(#[from] std::array::TryFromSliceError),
    #[error("The tile is shorter than its fixed-size header.")]
    TooShort,
    #[error("Data cast failed (this almost always means invalid data): {0}")]
    CastError(String),
    #[error("Tile level {0} does not exist in the hierarchy.")]
    UnsupportedTileLevel(u8),
}

/// A borrowed view over a single tile in the hierarchical tile graph.
///
/// All entity arrays are zero-copy casts into the underlying buffer;
/// individual fields decode lazily through their bit-field accessors.
pub struct GraphTileView<'a> {
    /// Header with various metadata about the tile and internal sizes.
    header: GraphTileHeader,
    /// The list of nodes in the graph tile.
    nodes: &'a [NodeInfo],
    /// Transitions between levels; decoded for completeness, skipped by
    /// the single-level bicycle search.
    transitions: &'a [NodeTransition],
    directed_edges: &'a [DirectedEdge],
}

impl GraphTileView<'_> {
    /// Gets the graph ID of the tile.
    #[inline]
    pub fn graph_id(&self) -> GraphId {
        self.header.graph_id()
    }

    /// Gets a reference to the [`GraphTileHeader`].
    #[inline]
    pub fn header(&self) -> &GraphTileHeader {
        &self.header
    }

    /// A raw slice of the tile's nodes (i.e. for snapping scans).
    #[inline]
    pub fn nodes(&self) -> &[NodeInfo] {
        self.nodes
    }

    /// A raw slice of the tile's level transitions.
    #[inline]
    pub fn transitions(&self) -> &[NodeTransition] {
        self.transitions
    }

    /// A raw slice of the tile's directed edges.
    #[inline]
    pub fn directed_edges(&self) -> &[DirectedEdge] {
        self.directed_edges
    }

    /// Gets a node by its index within this tile.
    #[inline]
    pub fn get_node(&self, index: u32) -> Option<&NodeInfo> {
        self.nodes.get(index as usize)
    }

    /// Gets a directed edge by its index within this tile.
    #[inline]
    pub fn get_directed_edge(&self, index: u32) -> Option<&DirectedEdge> {
        self.directed_edges.get(index as usize)
    }

    /// The outbound directed edges of a node, as a sub-slice of the edge
    /// array starting at [`NodeInfo::edge_index`].
    ///
    /// The run is clipped to the tile's edge array, so a corrupt node
    /// record yields a short (possibly empty) slice rather than a panic.
    pub fn outbound_edges(&self, node: &NodeInfo) -> &[DirectedEdge] {
        let start = node.edge_index() as usize;
        let end = start + node.edge_count() as usize;
        let clipped_start = start.min(self.directed_edges.len());
        let clipped_end = end.min(self.directed_edges.len());
        &self.directed_edges[clipped_start..clipped_end]
    }
}

impl<'a> TryFrom<&'a [u8]> for GraphTileView<'a> {
    type Error = GraphTileDecodingError;

    fn try_from(bytes: &'a [u8]) -> Result<Self, Self::Error> {
        const HEADER_SIZE: usize = size_of::<GraphTileHeader>();

        if bytes.len() < HEADER_SIZE {
            return Err(GraphTileDecodingError::TooShort);
        }

        // Fixed-size header
        let header_slice: [u8; HEADER_SIZE] = bytes[0..HEADER_SIZE].try_into()?;
        let header: GraphTileHeader = transmute!(header_slice);

        let level = header.graph_id().level();
        if level > 2 {
            return Err(GraphTileDecodingError::UnsupportedTileLevel(level));
        }

        // The entity arrays are consumed sequentially with
        // `ref_from_prefix_with_elems`, which hands back the remaining
        // tail after each cast. Offsets never need to be tracked by hand,
        // and a tile too short for its own counts fails the cast here
        // rather than panicking at lookup time.
        let bytes = &bytes[HEADER_SIZE..];

        let (nodes, bytes) =
            <[NodeInfo]>::ref_from_prefix_with_elems(bytes, header.node_count() as usize)
                .map_err(|e| GraphTileDecodingError::CastError(e.to_string()))?;
        let (transitions, bytes) = <[NodeTransition]>::ref_from_prefix_with_elems(
            bytes,
            header.transition_count() as usize,
        )
        .map_err(|e| GraphTileDecodingError::CastError(e.to_string()))?;
        let (directed_edges, _trailing) = <[DirectedEdge]>::ref_from_prefix_with_elems(
            bytes,
            header.directed_edge_count() as usize,
        )
        .map_err(|e| GraphTileDecodingError::CastError(e.to_string()))?;

        Ok(Self {
            header,
            nodes,
            transitions,
            directed_edges,
        })
    }
}

self_cell! {
    /// A read-only owned view of a graph tile.
    ///
    /// Owns the decompressed byte buffer; the dependent [`GraphTileView`]
    /// borrows its entity slices from it. Constructed from a `Vec<u8>`.
    pub struct GraphTileHandle {
        owner: Vec<u8>,
        #[covariant]
        dependent: GraphTileView,
    }
}

impl GraphTileHandle {
    /// The decoded view over the owned tile bytes.
    #[inline]
    pub fn view(&self) -> &GraphTileView<'_> {
        self.borrow_dependent()
    }
}

impl TryFrom<Vec<u8>> for GraphTileHandle {
    type Error = GraphTileDecodingError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        GraphTileHandle::try_new(value, |data| GraphTileView::try_from(data.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Access, RoadClass, RoadUse, Surface};
    use enumset::{EnumSet, enum_set};
    use geo::coord;

    fn small_tile() -> Vec<u8> {
        let graph_id = GraphId::try_from_components(2, 795_665, 0).unwrap();
        let mut builder = GraphTileBuilder::new(graph_id, coord! {x: 16.25f32, y: 48.0f32});

        let a = builder.add_node(coord! {x: 16.3719, y: 48.2082}, EnumSet::all());
        let b = builder.add_node(coord! {x: 16.3800, y: 48.2100}, EnumSet::all());
        builder
            .add_edge_for_node(
                a,
                EdgeSpec {
                    end_node: graph_id.with_index(u64::from(b)).unwrap(),
                    length_m: 250,
                    ..EdgeSpec::default()
                },
            )
            .unwrap();

        // A transition record that the router must skip over correctly.
        builder.add_transition(GraphId::try_from_components(1, 64_000, 9).unwrap(), true);

        builder
            .add_edge_for_node(
                b,
                EdgeSpec {
                    end_node: graph_id.with_index(u64::from(a)).unwrap(),
                    length_m: 250,
                    ..EdgeSpec::default()
                },
            )
            .unwrap();

        builder.into_bytes().unwrap()
    }

    #[test]
    fn test_decode_round_trip() {
        let bytes = small_tile();
        let handle = GraphTileHandle::try_from(bytes).unwrap();
        let view = handle.view();

        assert_eq!(view.header().node_count(), 2);
        assert_eq!(view.header().directed_edge_count(), 2);
        assert_eq!(view.header().transition_count(), 1);
        assert_eq!(view.graph_id().tile_id(), 795_665);

        let node = view.get_node(0).unwrap();
        let position = node.coordinate(view.header().sw_corner());
        assert!((position.x - 16.3719).abs() < 1e-6);
        assert!((position.y - 48.2082).abs() < 1e-6);

        let edges = view.outbound_edges(node);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].end_node_id().index(), 1);
        assert_eq!(edges[0].length_m(), 250);
    }

    #[test]
    fn test_trailing_bytes_are_tolerated() {
        let mut bytes = small_tile();
        bytes.extend_from_slice(&[0xAB; 64]);
        assert!(GraphTileHandle::try_from(bytes).is_ok());
    }

    #[test]
    fn test_truncated_tile_fails() {
        let bytes = small_tile();

        // Shorter than the header
        assert!(matches!(
            GraphTileHandle::try_from(bytes[..100].to_vec()),
            Err(GraphTileDecodingError::TooShort)
        ));

        // Header intact, edge array cut off
        assert!(matches!(
            GraphTileHandle::try_from(bytes[..bytes.len() - 40].to_vec()),
            Err(GraphTileDecodingError::CastError(_))
        ));
    }

    #[test]
    fn test_outbound_edge_run_is_clipped() {
        let graph_id = GraphId::try_from_components(2, 1_441, 0).unwrap();
        let mut builder = GraphTileBuilder::new(graph_id, coord! {x: -179.75f32, y: -89.75f32});
        builder.add_node(coord! {x: -179.7, y: -89.7}, enum_set!(Access::Bicycle));
        builder
            .add_edge(EdgeSpec {
                end_node: graph_id,
                length_m: 10,
                ..EdgeSpec::default()
            })
            .unwrap();
        let mut bytes = builder.into_bytes().unwrap();

        // Corrupt the node record so it claims five outbound edges: the
        // edge count lives in bits 21..28 of the node's second word.
        let word_offset = 272 + 8;
        let mut word = u64::from_le_bytes(bytes[word_offset..word_offset + 8].try_into().unwrap());
        word = (word & !(0x7F << 21)) | (5 << 21);
        bytes[word_offset..word_offset + 8].copy_from_slice(&word.to_le_bytes());

        let handle = GraphTileHandle::try_from(bytes).unwrap();
        let view = handle.view();
        let node = view.get_node(0).unwrap();
        assert_eq!(node.edge_count(), 5);
        // The run is clipped to the single edge that actually exists.
        assert_eq!(view.outbound_edges(node).len(), 1);
        assert!(view.get_directed_edge(1).is_none());
    }

    #[test]
    fn test_edge_attribute_round_trip() {
        let graph_id = GraphId::try_from_components(2, 1_442, 0).unwrap();
        let mut builder = GraphTileBuilder::new(graph_id, coord! {x: -179.5f32, y: -89.75f32});
        builder.add_node(coord! {x: -179.4, y: -89.7}, EnumSet::all());
        builder
            .add_edge(EdgeSpec {
                end_node: graph_id.with_index(0).unwrap(),
                forward_access: enum_set!(Access::Auto | Access::Bicycle),
                reverse_access: enum_set!(Access::Pedestrian),
                speed_kph: 70,
                road_use: RoadUse::Cycleway,
                lane_count: 2,
                classification: RoadClass::Primary,
                surface: Surface::Gravel,
                cycle_lane: 3,
                bike_network: true,
                use_sidepath: true,
                dismount: true,
                shoulder: true,
                length_m: 0xFF_FFFF,
                weighted_grade: 12,
            })
            .unwrap();
        let bytes = builder.into_bytes().unwrap();

        let handle = GraphTileHandle::try_from(bytes).unwrap();
        let edge = handle.view().get_directed_edge(0).unwrap();
        assert_eq!(edge.forward_access(), Access::Auto | Access::Bicycle);
        assert_eq!(edge.reverse_access(), enum_set!(Access::Pedestrian));
        assert_eq!(
            edge.access_union(),
            Access::Auto | Access::Bicycle | Access::Pedestrian
        );
        assert_eq!(edge.speed_kph(), 70);
        assert_eq!(edge.edge_use(), RoadUse::Cycleway);
        assert_eq!(edge.lane_count(), 2);
        assert_eq!(edge.classification(), RoadClass::Primary);
        assert_eq!(edge.surface(), Surface::Gravel);
        assert_eq!(edge.cycle_lane(), 3);
        assert!(edge.is_bike_network());
        assert!(edge.uses_sidepath());
        assert!(edge.requires_dismount());
        assert!(edge.has_shoulder());
        assert_eq!(edge.length_m(), 0xFF_FFFF);
        assert_eq!(edge.weighted_grade(), 12);
    }
}
