//! Nearest-node snapping: turns a requested coordinate into a routable
//! graph node within its tile.

use freewheel_graphtile::Access;
use freewheel_graphtile::graph_tile::GraphTileView;
use freewheel_graphtile::spatial::DistanceApproximator;
use geo::Coord;

/// Snaps farther than this are rejected ("no nearby road").
pub const MAX_SNAP_DISTANCE_M: f64 = 5_000.0;

/// A bike-or-foot-accessible node within this radius always wins over a
/// closer but inaccessible one.
const PREFER_ACCESSIBLE_WITHIN_M: f64 = 500.0;

/// Finds the node nearest to `target`, preferring nodes that have at
/// least one edge a cyclist can use (ride or push).
///
/// The accessible candidate is chosen when it lies within
/// [`PREFER_ACCESSIBLE_WITHIN_M`] or within twice the distance of the
/// globally nearest node. Returns `None` when the tile has no usable
/// nodes within [`MAX_SNAP_DISTANCE_M`].
pub fn nearest_node(view: &GraphTileView, target: Coord<f64>) -> Option<u32> {
    let approximator = DistanceApproximator::new(target);
    let sw_corner = view.header().sw_corner();

    let mut best: Option<(u32, f64)> = None;
    let mut best_accessible: Option<(u32, f64)> = None;

    for (index, node) in view.nodes().iter().enumerate() {
        // Isolated nodes cannot start a search.
        if node.edge_count() == 0 {
            continue;
        }
        #[allow(clippy::cast_possible_truncation)]
        let index = index as u32;
        let distance_sq = approximator.distance_squared(node.coordinate(sw_corner));

        let accessible = view.outbound_edges(node).iter().any(|edge| {
            let access = edge.access_union();
            access.contains(Access::Bicycle) || access.contains(Access::Pedestrian)
        });

        if accessible && best_accessible.is_none_or(|(_, d)| distance_sq < d) {
            best_accessible = Some((index, distance_sq));
        }
        if best.is_none_or(|(_, d)| distance_sq < d) {
            best = Some((index, distance_sq));
        }
    }

    let (_, global_sq) = best?;
    let chosen = match best_accessible {
        Some((index, accessible_sq))
            if accessible_sq < PREFER_ACCESSIBLE_WITHIN_M * PREFER_ACCESSIBLE_WITHIN_M
                || accessible_sq < global_sq * 4.0 =>
        {
            (index, accessible_sq)
        }
        _ => best?,
    };

    (chosen.1 <= MAX_SNAP_DISTANCE_M * MAX_SNAP_DISTANCE_M).then_some(chosen.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use enumset::{EnumSet, enum_set};
    use freewheel_graphtile::GraphId;
    use freewheel_graphtile::graph_tile::{EdgeSpec, GraphTileBuilder, GraphTileHandle};
    use geo::coord;

    const SW: geo::Coord<f32> = geo::Coord { x: 16.25, y: 48.0 };

    fn tile_with(nodes: &[(f64, f64, EnumSet<Access>)]) -> GraphTileHandle {
        let graph_id = GraphId::try_from_components(2, 795_665, 0).unwrap();
        let mut builder = GraphTileBuilder::new(graph_id, SW);
        for (lon, lat, edge_access) in nodes {
            builder.add_node(coord! {x: *lon, y: *lat}, EnumSet::all());
            builder
                .add_edge(EdgeSpec {
                    end_node: graph_id,
                    forward_access: *edge_access,
                    reverse_access: *edge_access,
                    ..EdgeSpec::default()
                })
                .unwrap();
        }
        GraphTileHandle::try_from(builder.into_bytes().unwrap()).unwrap()
    }

    #[test]
    fn test_prefers_accessible_node() {
        // The nearest node is cars-only; the bikeable one is a bit
        // farther but well within the preference radius.
        let tile = tile_with(&[
            (16.3700, 48.2080, enum_set!(Access::Auto)),
            (16.3720, 48.2090, enum_set!(Access::Bicycle)),
        ]);
        let found = nearest_node(tile.view(), coord! {x: 16.3700, y: 48.2080});
        assert_eq!(found, Some(1));
    }

    #[test]
    fn test_falls_back_to_global_nearest() {
        // Accessible node is ~20km away (out of the preference range and
        // past the snap ceiling for it to win); the cars-only node is
        // right here.
        let tile = tile_with(&[
            (16.3700, 48.2080, enum_set!(Access::Auto)),
            (16.3700, 48.0100, enum_set!(Access::Pedestrian)),
        ]);
        let found = nearest_node(tile.view(), coord! {x: 16.3700, y: 48.2080});
        assert_eq!(found, Some(0));
    }

    #[test]
    fn test_rejects_snaps_past_the_ceiling() {
        // Only node is across the tile, >5km from the target.
        let tile = tile_with(&[(16.2600, 48.0100, enum_set!(Access::Bicycle))]);
        let found = nearest_node(tile.view(), coord! {x: 16.37, y: 48.20});
        assert_eq!(found, None);
    }

    #[test]
    fn test_empty_tile() {
        let graph_id = GraphId::try_from_components(2, 795_665, 0).unwrap();
        let builder = GraphTileBuilder::new(graph_id, SW);
        let tile = GraphTileHandle::try_from(builder.into_bytes().unwrap()).unwrap();
        assert_eq!(nearest_node(tile.view(), coord! {x: 16.37, y: 48.20}), None);
    }
}
