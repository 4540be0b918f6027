//! # The tile hierarchy
//!
//! The graph is cut into square lat/lon tiles at three levels of detail.
//! Level 2 ("local", 0.25° tiles) contains every road and is the only
//! level the bicycle router searches, but tiles at all three levels
//! decode identically so hierarchical search can be reintroduced.

use super::{GraphId, RoadClass};
use geo::{Coord, Rect, coord};
use std::sync::LazyLock;

/// The hierarchy level the router operates on.
pub const LOCAL_LEVEL: u8 = 2;

/// A tiling system description.
///
/// Everything is hard-coded to WGS84 with square degree-based tiles.
pub struct TilingSystem {
    /// The bounding box of the tiling system.
    pub bounding_box: Rect<f32>,
    /// The size of each side of a square tile, in degrees.
    pub tile_size: f32,
    /// The number of rows in the tiling system.
    pub n_rows: u32,
    /// The number of columns in the tiling system.
    pub n_cols: u32,
}

impl TilingSystem {
    fn new(bounding_box: Rect<f32>, tile_size: f32) -> Self {
        Self {
            bounding_box,
            tile_size,
            #[expect(clippy::cast_possible_truncation)]
            #[expect(clippy::cast_sign_loss)]
            n_rows: (bounding_box.height() / tile_size).round() as u32,
            #[expect(clippy::cast_possible_truncation)]
            #[expect(clippy::cast_sign_loss)]
            n_cols: (bounding_box.width() / tile_size).round() as u32,
        }
    }

    pub const fn tile_count(&self) -> u32 {
        self.n_rows * self.n_cols
    }
}

/// A level in the tile hierarchy.
pub struct TileLevel {
    /// The hierarchy level.
    pub level: u8,
    /// The minimum class of road contained in this hierarchy level.
    pub minimum_road_class: RoadClass,
    /// The human-readable name of the level.
    pub name: &'static str,
    /// The tiling system used for this level.
    pub tiling_system: TilingSystem,
}

impl TileLevel {
    /// Returns the base graph ID of the tile containing the coordinate,
    /// or `None` for coordinates outside the WGS84 range.
    ///
    /// Tiles are indexed row-major from the southwest corner of the grid.
    pub fn tile_containing(&self, coordinate: Coord<f64>) -> Option<GraphId> {
        let size = f64::from(self.tiling_system.tile_size);
        if !(-90.0..=90.0).contains(&coordinate.y) || !(-180.0..=180.0).contains(&coordinate.x) {
            return None;
        }

        #[expect(clippy::cast_possible_truncation)]
        let row = (((coordinate.y + 90.0) / size).floor() as i64)
            .clamp(0, i64::from(self.tiling_system.n_rows) - 1);
        #[expect(clippy::cast_possible_truncation)]
        let col = (((coordinate.x + 180.0) / size).floor() as i64)
            .clamp(0, i64::from(self.tiling_system.n_cols) - 1);

        #[expect(clippy::cast_sign_loss)]
        let tile_index = (row * i64::from(self.tiling_system.n_cols) + col) as u64;
        GraphId::try_from_components(self.level, tile_index, 0).ok()
    }
}

/// The standard three-level tile system.
pub static STANDARD_LEVELS: LazyLock<[TileLevel; 3]> = LazyLock::new(|| {
    [
        TileLevel {
            level: 0,
            minimum_road_class: RoadClass::Primary,
            name: "highway",
            tiling_system: TilingSystem::new(
                Rect::new(
                    coord! { x: -180f32, y: -90f32 },
                    coord! { x: 180f32, y: 90f32 },
                ),
                4.0,
            ),
        },
        TileLevel {
            level: 1,
            minimum_road_class: RoadClass::Tertiary,
            name: "arterial",
            tiling_system: TilingSystem::new(
                Rect::new(
                    coord! { x: -180f32, y: -90f32 },
                    coord! { x: 180f32, y: 90f32 },
                ),
                1.0,
            ),
        },
        TileLevel {
            level: 2,
            minimum_road_class: RoadClass::ServiceOther,
            name: "local",
            tiling_system: TilingSystem::new(
                Rect::new(
                    coord! { x: -180f32, y: -90f32 },
                    coord! { x: 180f32, y: 90f32 },
                ),
                0.25,
            ),
        },
    ]
});

/// The level the router searches.
pub fn local_level() -> &'static TileLevel {
    &STANDARD_LEVELS[LOCAL_LEVEL as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_level_dimensions() {
        let level = local_level();
        assert_eq!(level.tiling_system.n_cols, 1440);
        assert_eq!(level.tiling_system.n_rows, 720);
        assert_eq!(level.tiling_system.tile_count(), 1_036_800);
    }

    #[test]
    fn test_tile_containing_row_major() {
        let level = local_level();

        // Central Vienna: row 552, col 785.
        let id = level
            .tile_containing(coord! { x: 16.3719, y: 48.2082 })
            .unwrap();
        assert_eq!(id.tile_id(), 552 * 1440 + 785);
        assert_eq!(id.level(), 2);
        assert_eq!(id.index(), 0);

        // Southwest corner of the grid is tile 0.
        let id = level
            .tile_containing(coord! { x: -180.0, y: -90.0 })
            .unwrap();
        assert_eq!(id.tile_id(), 0);
    }

    #[test]
    fn test_tile_containing_rejects_out_of_range() {
        let level = local_level();
        assert!(level.tile_containing(coord! { x: 0.0, y: 91.0 }).is_none());
        assert!(level.tile_containing(coord! { x: 181.0, y: 0.0 }).is_none());
    }

    #[test]
    fn test_coarser_levels() {
        assert_eq!(STANDARD_LEVELS[0].tiling_system.n_cols, 90);
        assert_eq!(STANDARD_LEVELS[1].tiling_system.n_cols, 360);

        let id = STANDARD_LEVELS[0]
            .tile_containing(coord! { x: 16.3719, y: 48.2082 })
            .unwrap();
        assert_eq!(id.level(), 0);
        // 4 degree tiles: row 34, col 49.
        assert_eq!(id.tile_id(), 34 * 90 + 49);
    }
}
