use super::directed_edge::assemble_directed_edge;
use super::header::{VERSION_LEN, assemble_header};
use super::node::{assemble_node, assemble_transition};
use super::{DirectedEdge, GraphId, NodeInfo, NodeTransition};
use crate::{Access, RoadClass, RoadUse, Surface};
use enumset::EnumSet;
use flate2::Compression;
use flate2::write::GzEncoder;
use geo::Coord;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zerocopy::IntoBytes;

/// The writer version stamped into the header's fixed-size version field.
const WRITER_VERSION: [u8; VERSION_LEN] = {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const BYTES: [&[u8]; 2] = ["freewheel-".as_bytes(), VERSION.as_bytes()];

    let mut out = [0u8; VERSION_LEN];
    let mut i = 0;
    let mut l = 0;
    while l < BYTES.len() {
        let mut c = 0;
        while c < BYTES[l].len() {
            out[i] = BYTES[l][c];
            i += 1;
            c += 1;
        }
        l += 1;
    }
    out
};

#[derive(Debug, Error)]
pub enum GraphTileBuildError {
    #[error("Invalid index: {0}.")]
    InvalidIndex(String),
    #[error(
        "Bitfield overflow: value {value} for field {field} exceeds the allowed number of bits."
    )]
    BitfieldOverflow { field: &'static str, value: u64 },
    #[error("Coordinate lies outside the tile (offsets must be non-negative).")]
    CoordinateOutsideTile,
    #[error("Invalid graph ID: {0}")]
    InvalidGraphId(#[from] crate::InvalidGraphIdError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Attributes of a directed edge to be written.
///
/// Defaults describe an unremarkable residential street with full access;
/// override the fields that matter.
pub struct EdgeSpec {
    pub end_node: GraphId,
    pub forward_access: EnumSet<Access>,
    pub reverse_access: EnumSet<Access>,
    pub speed_kph: u8,
    pub road_use: RoadUse,
    pub lane_count: u8,
    pub classification: RoadClass,
    pub surface: Surface,
    /// 0 none, 1 shared, 2 dedicated, 3 separated.
    pub cycle_lane: u8,
    pub bike_network: bool,
    pub use_sidepath: bool,
    pub dismount: bool,
    pub shoulder: bool,
    pub length_m: u32,
    /// 0 decodes as flat (7); pass 7 for explicit flat.
    pub weighted_grade: u8,
}

impl Default for EdgeSpec {
    fn default() -> Self {
        Self {
            end_node: GraphId::try_from_components(2, 0, 0).expect("static ID is valid"),
            forward_access: EnumSet::all(),
            reverse_access: EnumSet::all(),
            speed_kph: 0,
            road_use: RoadUse::Road,
            lane_count: 1,
            classification: RoadClass::Residential,
            surface: Surface::Paved,
            cycle_lane: 0,
            bike_network: false,
            use_sidepath: false,
            dismount: false,
            shoulder: false,
            length_m: 100,
            weighted_grade: 7,
        }
    }
}

struct PendingNode {
    coordinate: Coord<f64>,
    access: EnumSet<Access>,
    edges: Vec<EdgeSpec>,
}

/// Assembles graph tiles in the exact binary layout the decoder reads.
///
/// Nodes own their outbound edges; the forward-star bookkeeping
/// (`edge_index` / `edge_count`) is derived late, when the tile is
/// materialized, so edges may be attached to nodes in any order.
pub struct GraphTileBuilder {
    graph_id: GraphId,
    sw_corner: Coord<f32>,
    dataset_id: u64,
    nodes: Vec<PendingNode>,
    transitions: Vec<NodeTransition>,
}

impl GraphTileBuilder {
    pub fn new(graph_id: GraphId, sw_corner: Coord<f32>) -> Self {
        Self {
            graph_id: graph_id.tile_base_id(),
            sw_corner,
            dataset_id: 0,
            nodes: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn set_dataset_id(&mut self, dataset_id: u64) {
        self.dataset_id = dataset_id;
    }

    /// Adds a node and returns its index within the tile.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add_node(&mut self, coordinate: Coord<f64>, access: EnumSet<Access>) -> u32 {
        self.nodes.push(PendingNode {
            coordinate,
            access,
            edges: Vec::new(),
        });
        (self.nodes.len() - 1) as u32
    }

    /// Attaches an outbound edge to the most recently added node.
    ///
    /// # Errors
    ///
    /// Fails if no node has been added yet.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add_edge(&mut self, spec: EdgeSpec) -> Result<(), GraphTileBuildError> {
        let index = (self.nodes.len() as u32)
            .checked_sub(1)
            .ok_or_else(|| GraphTileBuildError::InvalidIndex("no nodes added yet".to_string()))?;
        self.add_edge_for_node(index, spec)
    }

    /// Attaches an outbound edge to the node at the given index.
    ///
    /// # Errors
    ///
    /// Fails if the node index does not exist.
    pub fn add_edge_for_node(
        &mut self,
        node_index: u32,
        spec: EdgeSpec,
    ) -> Result<(), GraphTileBuildError> {
        let node = self
            .nodes
            .get_mut(node_index as usize)
            .ok_or_else(|| GraphTileBuildError::InvalidIndex(node_index.to_string()))?;
        node.edges.push(spec);
        Ok(())
    }

    /// Adds a level transition record.
    pub fn add_transition(&mut self, end_node: GraphId, up: bool) {
        self.transitions.push(assemble_transition(end_node, up));
    }

    /// Materializes the tile as its on-disk byte layout (uncompressed).
    ///
    /// # Errors
    ///
    /// Fails when a count or coordinate offset exceeds its bit-field
    /// range.
    #[allow(clippy::cast_possible_truncation)]
    pub fn into_bytes(self) -> Result<Vec<u8>, GraphTileBuildError> {
        let node_count = self.nodes.len() as u64;
        let edge_count: u64 = self.nodes.iter().map(|n| n.edges.len() as u64).sum();
        let transition_count = self.transitions.len() as u64;

        check_field("node_count", node_count, 21)?;
        check_field("directed_edge_count", edge_count, 21)?;
        check_field("transition_count", transition_count, 22)?;

        let mut nodes: Vec<NodeInfo> = Vec::with_capacity(self.nodes.len());
        let mut directed_edges: Vec<DirectedEdge> = Vec::with_capacity(edge_count as usize);
        for pending in &self.nodes {
            check_offsets(pending.coordinate, self.sw_corner)?;
            check_field("edge_count", pending.edges.len() as u64, 7)?;
            nodes.push(assemble_node(
                pending.coordinate,
                self.sw_corner,
                pending.access,
                directed_edges.len() as u32,
                pending.edges.len() as u8,
            ));
            for spec in &pending.edges {
                check_field("length", u64::from(spec.length_m), 24)?;
                check_field("cycle_lane", u64::from(spec.cycle_lane), 2)?;
                check_field("lane_count", u64::from(spec.lane_count), 4)?;
                check_field("weighted_grade", u64::from(spec.weighted_grade), 4)?;
                directed_edges.push(assemble_directed_edge(&EdgeSpec {
                    end_node: spec.end_node,
                    forward_access: spec.forward_access,
                    reverse_access: spec.reverse_access,
                    speed_kph: spec.speed_kph,
                    road_use: spec.road_use,
                    lane_count: spec.lane_count,
                    classification: spec.classification,
                    surface: spec.surface,
                    cycle_lane: spec.cycle_lane,
                    bike_network: spec.bike_network,
                    use_sidepath: spec.use_sidepath,
                    dismount: spec.dismount,
                    shoulder: spec.shoulder,
                    length_m: spec.length_m,
                    weighted_grade: spec.weighted_grade,
                }));
            }
        }

        let tile_size = size_of::<super::GraphTileHeader>()
            + nodes.len() * size_of::<NodeInfo>()
            + self.transitions.len() * size_of::<NodeTransition>()
            + directed_edges.len() * size_of::<DirectedEdge>();

        let header = assemble_header(
            self.graph_id,
            self.sw_corner,
            WRITER_VERSION,
            self.dataset_id,
            node_count as u32,
            edge_count as u32,
            transition_count as u32,
            tile_size as u32,
        );

        let mut out = Vec::with_capacity(tile_size);
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(nodes.as_bytes());
        out.extend_from_slice(self.transitions.as_bytes());
        out.extend_from_slice(directed_edges.as_bytes());
        debug_assert_eq!(out.len(), tile_size);
        Ok(out)
    }

    /// Writes the tile, gzip-compressed, into its canonical location under
    /// `root` (creating intermediate directories), and returns the path.
    ///
    /// # Errors
    ///
    /// Fails on materialization errors (see [`GraphTileBuilder::into_bytes`])
    /// or filesystem errors.
    pub fn write_to_dir(self, root: &Path) -> Result<PathBuf, GraphTileBuildError> {
        let relative = self.graph_id.file_path("gph.gz")?;
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let bytes = self.into_bytes()?;
        let file = std::fs::File::create(&path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&bytes)?;
        encoder.finish()?;
        Ok(path)
    }
}

fn check_field(field: &'static str, value: u64, bits: u32) -> Result<(), GraphTileBuildError> {
    if value >= (1 << bits) {
        Err(GraphTileBuildError::BitfieldOverflow { field, value })
    } else {
        Ok(())
    }
}

fn check_offsets(coordinate: Coord<f64>, sw_corner: Coord<f32>) -> Result<(), GraphTileBuildError> {
    // 22 bits of microdegrees (plus the 4-bit refinement) per axis.
    let max_offset = f64::from((1u32 << 22) - 1) * 1e-6;
    let lat_offset = coordinate.y - f64::from(sw_corner.y);
    let lon_offset = coordinate.x - f64::from(sw_corner.x);
    if (0.0..=max_offset).contains(&lat_offset) && (0.0..=max_offset).contains(&lon_offset) {
        Ok(())
    } else {
        Err(GraphTileBuildError::CoordinateOutsideTile)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use geo::coord;

    #[test]
    fn test_rejects_coordinates_south_of_the_tile() {
        let graph_id = GraphId::try_from_components(2, 795_665, 0).unwrap();
        let mut builder = GraphTileBuilder::new(graph_id, coord! {x: 16.25f32, y: 48.0f32});
        builder.add_node(coord! {x: 16.3, y: 47.9}, EnumSet::all());
        assert!(matches!(
            builder.into_bytes(),
            Err(GraphTileBuildError::CoordinateOutsideTile)
        ));
    }

    #[test]
    fn test_rejects_oversized_edge_run() {
        let graph_id = GraphId::try_from_components(2, 795_665, 0).unwrap();
        let mut builder = GraphTileBuilder::new(graph_id, coord! {x: 16.25f32, y: 48.0f32});
        builder.add_node(coord! {x: 16.3, y: 48.1}, EnumSet::all());
        for _ in 0..128 {
            builder.add_edge(EdgeSpec::default()).unwrap();
        }
        assert!(matches!(
            builder.into_bytes(),
            Err(GraphTileBuildError::BitfieldOverflow {
                field: "edge_count",
                ..
            })
        ));
    }

    #[test]
    fn test_version_stamp() {
        let graph_id = GraphId::try_from_components(2, 795_665, 0).unwrap();
        let builder = GraphTileBuilder::new(graph_id, coord! {x: 16.25f32, y: 48.0f32});
        let bytes = builder.into_bytes().unwrap();
        let handle = crate::graph_tile::GraphTileHandle::try_from(bytes).unwrap();
        assert!(handle.view().header().version().starts_with("freewheel-"));
    }
}
