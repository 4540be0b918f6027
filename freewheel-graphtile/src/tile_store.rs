//! # Tile storage
//!
//! Loads gzip-compressed graph tiles from a directory tree and keeps a
//! small, fixed-size cache of decoded tiles.

use crate::GraphId;
use crate::graph_tile::GraphTileHandle;
use flate2::read::GzDecoder;
use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default cache size.
///
/// Lookup is a linear scan, so the cache is deliberately small; a route
/// across several hundred kilometers touches well under this many local
/// tiles thanks to search locality.
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 200;

/// A graph tile store backed by a directory of `.gph.gz` files.
///
/// # Ownership and failure model
///
/// The store owns every decoded tile buffer and hands out [`Arc`] clones,
/// so a handle obtained before an eviction stays valid for as long as the
/// caller keeps it. A tile that cannot be opened or decoded yields `None`:
/// during traversal an absent tile simply means its edges cannot be
/// followed, and only the caller knows whether absence is fatal (it is for
/// the start and end tiles).
///
/// # Eviction
///
/// First-in, first-out with a hard capacity. This engine runs one query
/// per process, so recency tracking buys nothing over insertion order.
pub struct DirectoryTileStore {
    base_directory: PathBuf,
    capacity: usize,
    cache: VecDeque<(u64, Arc<GraphTileHandle>)>,
}

impl DirectoryTileStore {
    pub fn new(base_directory: PathBuf, capacity: usize) -> Self {
        Self {
            base_directory,
            capacity: capacity.max(1),
            cache: VecDeque::new(),
        }
    }

    /// Gets the tile containing the given graph ID, loading and caching it
    /// on a miss. Returns `None` when the tile file is missing, truncated,
    /// or otherwise undecodable.
    pub fn get(&mut self, graph_id: GraphId) -> Option<Arc<GraphTileHandle>> {
        let key = graph_id.tile_base_id().value();
        if let Some((_, tile)) = self.cache.iter().find(|(id, _)| *id == key) {
            return Some(Arc::clone(tile));
        }

        let tile = Arc::new(self.load(graph_id)?);
        if self.cache.len() >= self.capacity {
            self.cache.pop_front();
        }
        self.cache.push_back((key, Arc::clone(&tile)));
        Some(tile)
    }

    /// The number of tiles currently held by the cache.
    pub fn cached_tile_count(&self) -> usize {
        self.cache.len()
    }

    fn load(&self, graph_id: GraphId) -> Option<GraphTileHandle> {
        let relative = match graph_id.tile_base_id().file_path("gph.gz") {
            Ok(path) => path,
            Err(e) => {
                warn!(%graph_id, error = %e, "Cannot derive a tile path");
                return None;
            }
        };
        let path = self.base_directory.join(relative);

        let file = match std::fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Tile does not exist");
                return None;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to open tile");
                return None;
            }
        };

        let mut bytes = Vec::new();
        if let Err(e) = GzDecoder::new(file).read_to_end(&mut bytes) {
            warn!(path = %path.display(), error = %e, "Failed to decompress tile");
            return None;
        }

        match GraphTileHandle::try_from(bytes) {
            Ok(tile) => Some(tile),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to decode tile");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_tile::GraphTileBuilder;
    use enumset::EnumSet;
    use geo::coord;
    use std::io::Write;

    fn write_tile(root: &std::path::Path, tile_id: u64, sw: geo::Coord<f32>) {
        let graph_id = GraphId::try_from_components(2, tile_id, 0).unwrap();
        let mut builder = GraphTileBuilder::new(graph_id, sw);
        builder.add_node(
            coord! {x: f64::from(sw.x) + 0.01, y: f64::from(sw.y) + 0.01},
            EnumSet::all(),
        );
        builder.write_to_dir(root).unwrap();
    }

    #[test]
    fn test_get_tile() {
        let dir = tempfile::tempdir().unwrap();
        write_tile(dir.path(), 795_665, coord! {x: 16.25f32, y: 48.0f32});

        let mut store = DirectoryTileStore::new(dir.path().to_path_buf(), 4);
        let graph_id = GraphId::try_from_components(2, 795_665, 17).unwrap();
        let tile = store.get(graph_id).expect("tile should load");
        assert_eq!(tile.view().graph_id().tile_id(), 795_665);
        assert_eq!(tile.view().header().node_count(), 1);

        // Second hit comes from the cache.
        assert!(store.get(graph_id).is_some());
        assert_eq!(store.cached_tile_count(), 1);
    }

    #[test]
    fn test_missing_tile_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DirectoryTileStore::new(dir.path().to_path_buf(), 4);
        let graph_id = GraphId::try_from_components(2, 12, 0).unwrap();
        assert!(store.get(graph_id).is_none());
    }

    #[test]
    fn test_truncated_tile_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let graph_id = GraphId::try_from_components(2, 795_665, 0).unwrap();
        let path = dir
            .path()
            .join(graph_id.file_path("gph.gz").unwrap());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        // A valid gzip stream holding fewer bytes than the tile header.
        let file = std::fs::File::create(&path).unwrap();
        let mut encoder =
            flate2::write::GzEncoder::new(file, flate2::Compression::default());
        encoder.write_all(&[0u8; 64]).unwrap();
        encoder.finish().unwrap();

        let mut store = DirectoryTileStore::new(dir.path().to_path_buf(), 4);
        assert!(store.get(graph_id).is_none());
    }

    #[test]
    fn test_fifo_eviction() {
        let dir = tempfile::tempdir().unwrap();
        // Three adjacent tiles on the equator row.
        write_tile(dir.path(), 518_400, coord! {x: -180.0f32, y: 0.0f32});
        write_tile(dir.path(), 518_401, coord! {x: -179.75f32, y: 0.0f32});
        write_tile(dir.path(), 518_402, coord! {x: -179.5f32, y: 0.0f32});

        let mut store = DirectoryTileStore::new(dir.path().to_path_buf(), 2);
        let id = |t| GraphId::try_from_components(2, t, 0).unwrap();

        let first = store.get(id(518_400)).unwrap();
        store.get(id(518_401)).unwrap();
        store.get(id(518_402)).unwrap();
        assert_eq!(store.cached_tile_count(), 2);

        // The oldest tile was evicted, but the held handle stays valid.
        assert_eq!(first.view().graph_id().tile_id(), 518_400);
        assert!(
            store
                .cache
                .iter()
                .all(|(key, _)| *key != id(518_400).value())
        );
    }
}
