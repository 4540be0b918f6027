//! # freewheel-router
//!
//! The bicycle routing kernel: a per-edge cost model encoding a family of
//! cyclist preferences, and a bidirectional A* search over the tiled road
//! graph. Designed for single-query invocations on small machines: all
//! working memory is owned by the query, sized up front, and bounded.

pub mod costing;
mod locate;
mod queue;
mod search;
mod summary;
mod visited;

pub use costing::{BicycleType, CostModel, CostingOptions};
pub use search::{Route, RouteError, RouteRequest, Router, RouterConfig};
pub use summary::RouteSummary;

use freewheel_graphtile::tile_hierarchy::LOCAL_LEVEL;
use freewheel_graphtile::{GraphId, InvalidGraphIdError};

/// The search's identification of a position: a node within a local-level
/// tile. The hierarchy level is implicit (always the local level).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct State {
    pub tile_id: u32,
    pub node_id: u32,
}

impl State {
    /// The state's position as a graph ID on the local level.
    ///
    /// # Errors
    ///
    /// Fails if the fields exceed their graph ID bit widths (states
    /// produced by the search never do; hand-built ones might).
    pub fn graph_id(self) -> Result<GraphId, InvalidGraphIdError> {
        GraphId::try_from_components(LOCAL_LEVEL, u64::from(self.tile_id), u64::from(self.node_id))
    }

    /// Extracts the (tile, node) pair from a graph ID, discarding the level.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_graph_id(id: GraphId) -> Self {
        Self {
            tile_id: id.tile_id() as u32,
            node_id: id.index() as u32,
        }
    }
}
