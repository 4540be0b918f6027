//! Bidirectional A* over the tiled road graph.
//!
//! Two frontiers run toward each other, one from each snapped endpoint.
//! Because edges are undirected for cycling, the backward search expands
//! exactly like the forward one; the two differ only in their heuristic
//! target and which visited table they write. The search settles a
//! meeting point, proves it optimal with the standard f-sum bound, and
//! stitches the final path out of both parent chains.

use crate::State;
use crate::costing::{CostModel, CostingOptions};
use crate::locate::nearest_node;
use crate::queue::{DEFAULT_QUEUE_CAPACITY, FrontierEntry, SearchQueue};
use crate::summary::{RouteSummary, summarize};
use crate::visited::{DEFAULT_VISITED_CAPACITY, VisitedSet};
use freewheel_graphtile::tile_hierarchy::{LOCAL_LEVEL, local_level};
use freewheel_graphtile::tile_store::{DEFAULT_TILE_CACHE_CAPACITY, DirectoryTileStore};
use geo::{Coord, Distance, Haversine, Point};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

/// Reconstruction refuses to walk longer parent chains than this.
const DEFAULT_MAX_PATH_LEN: usize = 200_000;

/// Iteration budget per straight-line kilometer between the endpoints.
const ITERATIONS_PER_KM: f64 = 30_000.0;
const MIN_ITERATIONS: u64 = 1_000_000;
const MAX_ITERATIONS: u64 = 6_000_000;

/// Sizing knobs for the per-query working set.
///
/// The defaults match the engine's reference resource model (tens of
/// megabytes of fixed buffers); embedded deployments with known route
/// lengths can shrink every one of them.
#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    /// Max entries per frontier queue.
    pub queue_capacity: usize,
    /// Slots per visited table (use a prime).
    pub visited_capacity: usize,
    /// Decoded tiles held by the FIFO cache.
    pub tile_cache_capacity: usize,
    /// Upper bound on reconstructed path length.
    pub max_path_len: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            visited_capacity: DEFAULT_VISITED_CAPACITY,
            tile_cache_capacity: DEFAULT_TILE_CACHE_CAPACITY,
            max_path_len: DEFAULT_MAX_PATH_LEN,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    /// A tile required to even begin the search (start or end) failed to
    /// load. Absent tiles elsewhere are absorbed silently.
    #[error("failed to load the start or end tile")]
    TileLoadFailed,
    /// Neither endpoint could be snapped to a routable node.
    #[error("no routable node near the requested coordinate")]
    NoNearbyRoad,
    /// The frontiers never met within the iteration budget.
    #[error("no path between the requested coordinates")]
    NoPath,
}

/// A single routing query.
///
/// Coordinates are WGS84, x = longitude, y = latitude.
pub struct RouteRequest {
    pub from: Coord<f64>,
    pub to: Coord<f64>,
    pub options: CostingOptions,
}

/// A finished route.
#[derive(Debug)]
pub struct Route {
    /// The node states along the path, start to goal.
    pub path: Vec<State>,
    /// Node coordinates along the path.
    pub coords: Vec<Coord<f64>>,
    /// Distance classification of the traversed edges.
    pub summary: RouteSummary,
}

/// One search direction: its frontier queue, its visited table, and the
/// coordinate its heuristic aims at.
struct Frontier {
    queue: SearchQueue,
    visited: VisitedSet,
    target: Coord<f64>,
}

/// The routing context: owns the tile store and the sizing configuration.
///
/// All per-query buffers (two frontiers, the path) are allocated inside
/// [`Router::route`] and dropped with it; the router itself holds no
/// search state between queries.
pub struct Router {
    store: DirectoryTileStore,
    config: RouterConfig,
}

impl Router {
    pub fn new(tiles_dir: PathBuf) -> Self {
        Self::with_config(tiles_dir, RouterConfig::default())
    }

    pub fn with_config(tiles_dir: PathBuf, config: RouterConfig) -> Self {
        Self {
            store: DirectoryTileStore::new(tiles_dir, config.tile_cache_capacity),
            config,
        }
    }

    /// Computes the fastest weighted cycling path between two coordinates.
    ///
    /// # Errors
    ///
    /// - [`RouteError::TileLoadFailed`] when the start or end tile is
    ///   missing or undecodable.
    /// - [`RouteError::NoNearbyRoad`] when an endpoint cannot be snapped
    ///   to a routable node within the snap radius.
    /// - [`RouteError::NoPath`] when the searches exhaust their frontiers
    ///   or the iteration budget without meeting.
    pub fn route(&mut self, request: &RouteRequest) -> Result<Route, RouteError> {
        let cost_model = CostModel::new(request.options);
        let level = local_level();

        let start_tile_id = level
            .tile_containing(request.from)
            .ok_or(RouteError::TileLoadFailed)?;
        let end_tile_id = level
            .tile_containing(request.to)
            .ok_or(RouteError::TileLoadFailed)?;

        let start_tile = self
            .store
            .get(start_tile_id)
            .ok_or(RouteError::TileLoadFailed)?;
        let end_tile = self
            .store
            .get(end_tile_id)
            .ok_or(RouteError::TileLoadFailed)?;

        let start_node =
            nearest_node(start_tile.view(), request.from).ok_or(RouteError::NoNearbyRoad)?;
        let end_node = nearest_node(end_tile.view(), request.to).ok_or(RouteError::NoNearbyRoad)?;

        let start_state = State {
            node_id: start_node,
            ..State::from_graph_id(start_tile_id)
        };
        let end_state = State {
            node_id: end_node,
            ..State::from_graph_id(end_tile_id)
        };

        let start_position = start_tile
            .view()
            .get_node(start_node)
            .map(|n| n.coordinate(start_tile.view().header().sw_corner()))
            .ok_or(RouteError::NoNearbyRoad)?;
        let end_position = end_tile
            .view()
            .get_node(end_node)
            .map(|n| n.coordinate(end_tile.view().header().sw_corner()))
            .ok_or(RouteError::NoNearbyRoad)?;

        let crow_flight_m =
            Haversine.distance(Point::from(start_position), Point::from(end_position));
        let max_iterations = iteration_cap(crow_flight_m);
        debug!(
            crow_flight_km = crow_flight_m / 1000.0,
            max_iterations, "Starting bidirectional search"
        );

        // The forward frontier aims at the goal, the backward one at the
        // start; everything else about them is identical.
        let mut forward = self.frontier_toward(end_position);
        let mut backward = self.frontier_toward(start_position);

        let initial_h = heuristic(
            start_position,
            end_position,
            cost_model.heuristic_cost_per_meter(),
        );
        forward.queue.push(FrontierEntry {
            sort_cost: initial_h,
            cost: 0.0,
            distance_m: 0.0,
            state: start_state,
            parent: None,
            parent_edge_index: 0,
        });
        forward.visited.insert(start_state, 0.0, None, 0);
        backward.queue.push(FrontierEntry {
            sort_cost: initial_h,
            cost: 0.0,
            distance_m: 0.0,
            state: end_state,
            parent: None,
            parent_edge_index: 0,
        });
        backward.visited.insert(end_state, 0.0, None, 0);

        let mut best: Option<(State, f32)> = None;
        let mut iterations: u64 = 0;

        while (!forward.queue.is_empty() || !backward.queue.is_empty())
            && iterations < max_iterations
        {
            // One step per direction per iteration, strictly alternating.
            if let Some(entry) = forward.queue.pop() {
                iterations += 1;
                self.expand(&cost_model, &mut forward, &backward.visited, entry, &mut best);
            }
            if let Some(entry) = backward.queue.pop() {
                iterations += 1;
                self.expand(&cost_model, &mut backward, &forward.visited, entry, &mut best);
            }

            // Once the frontiers have met, the meeting total is optimal as
            // soon as no pair of still-queued entries can beat it.
            if let Some((_, best_total)) = best {
                let frontier_bound = forward.queue.min_sort_cost().unwrap_or(f32::INFINITY)
                    + backward.queue.min_sort_cost().unwrap_or(f32::INFINITY);
                if frontier_bound >= best_total {
                    debug!(iterations, best_total, "Meeting point proven optimal");
                    break;
                }
            }
        }

        let capacity_drops = forward.queue.dropped()
            + backward.queue.dropped()
            + forward.visited.dropped()
            + backward.visited.dropped();
        if capacity_drops > 0 {
            warn!(
                capacity_drops,
                "Search hit capacity limits; the result may be suboptimal"
            );
        }

        let Some((meeting, total_cost)) = best else {
            debug!(iterations, "Frontiers never met");
            return Err(RouteError::NoPath);
        };
        debug!(iterations, total_cost, "Reconstructing path");

        let path = self.reconstruct(&forward.visited, &backward.visited, meeting);
        let coords = self.path_coordinates(&path);
        let summary = summarize(&mut self.store, &path);
        Ok(Route {
            path,
            coords,
            summary,
        })
    }

    fn frontier_toward(&self, target: Coord<f64>) -> Frontier {
        Frontier {
            queue: SearchQueue::with_capacity(self.config.queue_capacity),
            visited: VisitedSet::with_capacity(self.config.visited_capacity),
            target,
        }
    }

    /// Settles one frontier entry: stale-skip, meeting-point check, and
    /// expansion of the node's outbound edges.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn expand(
        &mut self,
        cost_model: &CostModel,
        frontier: &mut Frontier,
        opposite_visited: &VisitedSet,
        entry: FrontierEntry,
        best: &mut Option<(State, f32)>,
    ) {
        // Lazy deletion: a superseded entry carries a cost above the
        // settled best for its state.
        if frontier
            .visited
            .get(entry.state)
            .is_some_and(|v| entry.cost > v.cost)
        {
            return;
        }

        // Has the opposite direction already settled this state?
        if let Some(opposite) = opposite_visited.get(entry.state) {
            let total = entry.cost + opposite.cost;
            if best.is_none_or(|(_, b)| total < b) {
                debug!(total, "New best meeting point");
                *best = Some((entry.state, total));
            }
        }

        let Ok(graph_id) = entry.state.graph_id() else {
            return;
        };
        let Some(tile) = self.store.get(graph_id) else {
            return;
        };
        let view = tile.view();
        let Some(node) = view.get_node(entry.state.node_id) else {
            return;
        };

        let heuristic_factor = cost_model.heuristic_cost_per_meter();
        let first_edge_index = node.edge_index();
        for (offset, edge) in view.outbound_edges(node).iter().enumerate() {
            let end = edge.end_node_id();
            // Only the local level is searched; hierarchy edges are inert.
            if end.level() != LOCAL_LEVEL {
                continue;
            }
            if !cost_model.is_traversable(edge) {
                continue;
            }

            let new_cost = entry.cost + cost_model.edge_cost(edge);
            let neighbor = State::from_graph_id(end);
            if frontier
                .visited
                .get(neighbor)
                .is_some_and(|v| new_cost >= v.cost)
            {
                continue;
            }

            // An edge into an absent tile is simply not followed.
            let Some(neighbor_tile) = self.store.get(end) else {
                continue;
            };
            let neighbor_view = neighbor_tile.view();
            let Some(neighbor_node) = neighbor_view.get_node(neighbor.node_id) else {
                continue;
            };
            let position = neighbor_node.coordinate(neighbor_view.header().sw_corner());

            let edge_index = first_edge_index + offset as u32;
            frontier.queue.push(FrontierEntry {
                sort_cost: new_cost + heuristic(position, frontier.target, heuristic_factor),
                cost: new_cost,
                distance_m: entry.distance_m + edge.length_m() as f32,
                state: neighbor,
                parent: Some(entry.state),
                parent_edge_index: edge_index,
            });
            frontier
                .visited
                .insert(neighbor, new_cost, Some(entry.state), edge_index);
        }
    }

    /// Stitches the final path: the forward parent chain from the meeting
    /// point back to the start (reversed), then the backward chain from
    /// the meeting point's predecessor out to the goal. Both walks are
    /// bounded, so a corrupt parent cycle cannot hang the query.
    fn reconstruct(
        &self,
        forward_visited: &VisitedSet,
        backward_visited: &VisitedSet,
        meeting: State,
    ) -> Vec<State> {
        let mut path = Vec::new();

        let mut cursor = Some(meeting);
        while let Some(state) = cursor {
            if path.len() >= self.config.max_path_len {
                break;
            }
            path.push(state);
            cursor = forward_visited.get(state).and_then(|v| v.parent);
        }
        path.reverse();

        let mut cursor = backward_visited.get(meeting).and_then(|v| v.parent);
        while let Some(state) = cursor {
            if path.len() >= self.config.max_path_len {
                break;
            }
            path.push(state);
            cursor = backward_visited.get(state).and_then(|v| v.parent);
        }

        path
    }

    /// Resolves each path state to its node coordinate. States whose tile
    /// has since become unreadable are skipped.
    fn path_coordinates(&mut self, path: &[State]) -> Vec<Coord<f64>> {
        path.iter()
            .filter_map(|state| {
                let graph_id = state.graph_id().ok()?;
                let tile = self.store.get(graph_id)?;
                let view = tile.view();
                let node = view.get_node(state.node_id)?;
                Some(node.coordinate(view.header().sw_corner()))
            })
            .collect()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn heuristic(position: Coord<f64>, target: Coord<f64>, cost_per_meter: f32) -> f32 {
    (Haversine.distance(Point::from(position), Point::from(target))
        * f64::from(cost_per_meter)) as f32
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn iteration_cap(crow_flight_m: f64) -> u64 {
    ((crow_flight_m / 1000.0 * ITERATIONS_PER_KM) as u64).clamp(MIN_ITERATIONS, MAX_ITERATIONS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_cap_scaling() {
        // Short hops get the floor, transcontinental asks get the ceiling.
        assert_eq!(iteration_cap(500.0), MIN_ITERATIONS);
        assert_eq!(iteration_cap(100_000.0), 3_000_000);
        assert_eq!(iteration_cap(1_000_000.0), MAX_ITERATIONS);
    }

    #[test]
    fn test_heuristic_is_zero_at_target() {
        let target = Coord { x: 16.37, y: 48.21 };
        assert_eq!(heuristic(target, target, 0.04), 0.0);
    }
}
