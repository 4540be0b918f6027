//! Per-segment classification of a finished path into the four distance
//! buckets reported to the user.

use crate::State;
use crate::costing::CostModel;
use freewheel_graphtile::Access;
use freewheel_graphtile::RoadUse;
use freewheel_graphtile::graph_tile::DirectedEdge;
use freewheel_graphtile::tile_store::DirectoryTileStore;

/// Distances (in meters) by how bike-friendly the traversed edges are.
///
/// The buckets partition the path: their sum equals the summed lengths of
/// the matched edges.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RouteSummary {
    /// On edges without any car access, or on low-traffic ways.
    pub car_free_m: f64,
    /// On-street but behind a dedicated or fully separated cycle lane.
    pub separated_m: f64,
    /// Sharing the roadway with cars.
    pub with_cars_m: f64,
    /// Walking the bike (no bike access, pedestrian access).
    pub pushing_m: f64,
}

impl RouteSummary {
    pub fn total_m(&self) -> f64 {
        self.car_free_m + self.separated_m + self.with_cars_m + self.pushing_m
    }

    /// Buckets one edge of the path.
    fn accumulate(&mut self, edge: &DirectedEdge) {
        let access = edge.access_union();
        let has_car = access.contains(Access::Auto);
        let length = f64::from(edge.length_m());

        let is_path_use = matches!(
            edge.edge_use(),
            RoadUse::Cycleway | RoadUse::Path | RoadUse::Footway | RoadUse::MountainBike
        );
        let is_low_traffic = matches!(
            edge.edge_use(),
            RoadUse::Track | RoadUse::LivingStreet | RoadUse::ServiceRoad
        );

        if CostModel::is_pushing(edge) {
            self.pushing_m += length;
        } else if is_path_use && !has_car {
            self.car_free_m += length;
        } else if is_low_traffic {
            self.car_free_m += length;
        } else if edge.cycle_lane() >= 2 {
            self.separated_m += length;
        } else if has_car {
            self.with_cars_m += length;
        } else {
            self.car_free_m += length;
        }
    }
}

/// Walks the final path and accumulates per-segment distances.
///
/// Each consecutive state pair is matched to the edge in the first node's
/// outbound run whose endpoint is the second state. Pairs that cannot be
/// matched (a tile vanished mid-walk) are skipped, mirroring how the
/// search itself treats absent tiles.
pub(crate) fn summarize(store: &mut DirectoryTileStore, path: &[State]) -> RouteSummary {
    let mut summary = RouteSummary::default();

    for pair in path.windows(2) {
        let (state, next) = (pair[0], pair[1]);
        let Ok(graph_id) = state.graph_id() else {
            continue;
        };
        let Some(tile) = store.get(graph_id) else {
            continue;
        };
        let view = tile.view();
        let Some(node) = view.get_node(state.node_id) else {
            continue;
        };

        if let Some(edge) = view.outbound_edges(node).iter().find(|edge| {
            let end = edge.end_node_id();
            State::from_graph_id(end) == next
        }) {
            summary.accumulate(edge);
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use enumset::enum_set;
    use freewheel_graphtile::GraphId;
    use freewheel_graphtile::graph_tile::{EdgeSpec, GraphTileBuilder, GraphTileHandle};
    use geo::coord;

    fn classify(spec: EdgeSpec) -> RouteSummary {
        let graph_id = GraphId::try_from_components(2, 1_445, 0).unwrap();
        let mut builder = GraphTileBuilder::new(graph_id, coord! {x: -178.75f32, y: -89.75f32});
        builder.add_node(coord! {x: -178.7, y: -89.7}, enum_set!(Access::Bicycle));
        builder.add_edge(spec).unwrap();
        let tile = GraphTileHandle::try_from(builder.into_bytes().unwrap()).unwrap();

        let mut summary = RouteSummary::default();
        summary.accumulate(tile.view().get_directed_edge(0).unwrap());
        summary
    }

    #[test]
    fn test_pushing_wins_over_everything() {
        let summary = classify(EdgeSpec {
            forward_access: enum_set!(Access::Pedestrian | Access::Auto),
            reverse_access: enum_set!(Access::Pedestrian),
            road_use: RoadUse::Footway,
            length_m: 50,
            ..EdgeSpec::default()
        });
        assert_eq!(summary.pushing_m, 50.0);
        assert_eq!(summary.total_m(), 50.0);
    }

    #[test]
    fn test_car_free_path_use() {
        let summary = classify(EdgeSpec {
            forward_access: enum_set!(Access::Bicycle),
            reverse_access: enum_set!(Access::Bicycle),
            road_use: RoadUse::Cycleway,
            length_m: 120,
            ..EdgeSpec::default()
        });
        assert_eq!(summary.car_free_m, 120.0);
    }

    #[test]
    fn test_low_traffic_is_car_free_even_with_cars() {
        let summary = classify(EdgeSpec {
            road_use: RoadUse::Track,
            length_m: 80,
            ..EdgeSpec::default()
        });
        assert_eq!(summary.car_free_m, 80.0);
    }

    #[test]
    fn test_separated_cycle_lane() {
        let summary = classify(EdgeSpec {
            cycle_lane: 2,
            length_m: 200,
            ..EdgeSpec::default()
        });
        assert_eq!(summary.separated_m, 200.0);
    }

    #[test]
    fn test_with_cars() {
        let summary = classify(EdgeSpec {
            length_m: 300,
            ..EdgeSpec::default()
        });
        assert_eq!(summary.with_cars_m, 300.0);
    }

    #[test]
    fn test_bike_only_road_falls_back_to_car_free() {
        let summary = classify(EdgeSpec {
            forward_access: enum_set!(Access::Bicycle),
            reverse_access: enum_set!(Access::Bicycle),
            road_use: RoadUse::Road,
            length_m: 40,
            ..EdgeSpec::default()
        });
        assert_eq!(summary.car_free_m, 40.0);
    }
}
