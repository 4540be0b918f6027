use crate::tile_hierarchy::STANDARD_LEVELS;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use thiserror::Error;
use zerocopy::{LE, U64};
use zerocopy_derive::{Immutable, IntoBytes, Unaligned};

/// The max valid hierarchy level.
///
/// There are 3 bits for the hierarchy level.
const MAX_HIERARCHY_LEVEL: u8 = (1 << 3) - 1;

/// The max valid tile ID.
///
/// There are 22 bits for the tile ID.
const MAX_GRAPH_TILE_ID: u64 = (1 << 22) - 1;

/// The max valid tile index.
///
/// There are 21 bits for the index within the tile.
const MAX_TILE_INDEX: u64 = (1 << 21) - 1;

/// All 46 bits set to 1.
const INVALID_GRAPH_ID: u64 = (1 << 46) - 1;

#[derive(Debug, Error, PartialEq)]
pub enum InvalidGraphIdError {
    #[error("Level is larger than the maximum allowed value.")]
    Level,
    #[error("Tile ID is larger than the maximum allowed value.")]
    GraphTileId,
    #[error("Tile index is larger than the maximum allowed value.")]
    TileIndex,
    #[error("Graph ID is invalid")]
    InvalidGraphId,
}

/// An identifier of a node or an edge within the tiled, hierarchical graph.
///
/// Packs a hierarchy level, tile ID, and a unique index within the
/// tile/level into 46 bits of a 64-bit integer:
///
/// ```text
///        MSb                                     LSb
///        ▼                                       ▼
/// bit   64         46        25         3        0
/// pos    ┌──────────┬─────────┬─────────┬────────┐
///        │ RESERVED │ id      │ tileid  │ level  │
///        └──────────┴─────────┴─────────┴────────┘
/// size     18         21        22        3
/// ```
///
/// Tile IDs are row-major indexes into the level's lat/lon grid
/// (see [`crate::tile_hierarchy`]).
#[repr(C)]
#[derive(IntoBytes, Immutable, Unaligned, Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct GraphId(U64<LE>);

impl GraphId {
    /// Tries to construct a graph ID from the given components.
    ///
    /// # Errors
    ///
    /// Fails if any argument contains a value greater than the allowed
    /// number of field bits:
    /// - `level` - 3 bits
    /// - `tile_id` - 22 bits
    /// - `index` - 21 bits
    #[inline]
    pub const fn try_from_components(
        level: u8,
        tile_id: u64,
        index: u64,
    ) -> Result<Self, InvalidGraphIdError> {
        if level > MAX_HIERARCHY_LEVEL {
            Err(InvalidGraphIdError::Level)
        } else if tile_id > MAX_GRAPH_TILE_ID {
            Err(InvalidGraphIdError::GraphTileId)
        } else if index > MAX_TILE_INDEX {
            Err(InvalidGraphIdError::TileIndex)
        } else {
            Ok(Self(U64::<LE>::new(
                level as u64 | (tile_id << 3) | index << 25,
            )))
        }
    }

    /// Creates a graph ID from the given components without validity checks.
    ///
    /// # Safety
    ///
    /// Invalid values risk things like out-of-bounds level indexes,
    /// which could cause crashes or other unexpected behavior.
    pub const unsafe fn from_components_unchecked(level: u8, tile_id: u64, index: u64) -> Self {
        Self(U64::<LE>::new(level as u64 | (tile_id << 3) | index << 25))
    }

    /// Creates a graph ID from the given raw value.
    ///
    /// # Errors
    ///
    /// Fails if the value does not conform to the field invariants.
    pub const fn try_from_id(id: u64) -> Result<Self, InvalidGraphIdError> {
        if id == INVALID_GRAPH_ID {
            return Err(InvalidGraphIdError::InvalidGraphId);
        }

        let result = GraphId(U64::<LE>::new(id));
        if result.level() > MAX_HIERARCHY_LEVEL {
            Err(InvalidGraphIdError::Level)
        } else if result.tile_id() > MAX_GRAPH_TILE_ID {
            Err(InvalidGraphIdError::GraphTileId)
        } else if result.index() > MAX_TILE_INDEX {
            Err(InvalidGraphIdError::TileIndex)
        } else {
            Ok(result)
        }
    }

    /// Creates a graph ID from the given raw value without validity checks.
    ///
    /// # Safety
    ///
    /// The value must fit in 46 bits; the field accessors mask their own
    /// ranges, so wider values silently lose data.
    pub const unsafe fn from_id_unchecked(id: u64) -> Self {
        Self(U64::<LE>::new(id))
    }

    /// Creates a new graph ID from the existing one, but with a new tile
    /// index. This is useful for indexing within a tile.
    ///
    /// # Errors
    ///
    /// See [`GraphId::try_from_components`] for a description of errors.
    #[inline]
    pub const fn with_index(&self, tile_index: u64) -> Result<Self, InvalidGraphIdError> {
        Self::try_from_components(self.level(), self.tile_id(), tile_index)
    }

    /// Extracts the raw (packed) graph ID value.
    #[inline]
    pub const fn value(&self) -> u64 {
        self.0.get()
    }

    /// Gets the hierarchy level.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn level(&self) -> u8 {
        (self.value() & MAX_HIERARCHY_LEVEL as u64) as u8
    }

    /// Gets the graph tile ID.
    #[inline]
    pub const fn tile_id(&self) -> u64 {
        (self.value() & 0x01ff_fff8) >> 3
    }

    /// Gets the unique identifier (index) within the tile and level.
    #[inline]
    pub const fn index(&self) -> u64 {
        (self.value() & 0x3fff_fe00_0000) >> 25
    }

    /// Returns a [`GraphId`] which omits the index within the level.
    /// This is useful primarily for deriving file names and cache keys.
    #[inline]
    #[must_use]
    pub const fn tile_base_id(&self) -> GraphId {
        GraphId(U64::<LE>::new(self.value() & 0x01ff_ffff))
    }

    /// Constructs the relative path of this tile under a tile root.
    ///
    /// The tile ID is zero-padded to a multiple of three digits and split
    /// into directory components of three digits each, e.g.
    /// `2/000/795/665.gph.gz` for level 2, tile 795665.
    ///
    /// # Errors
    ///
    /// Fails if the tile ID is out of range for this level of tiling,
    /// or the level has no tiling system (only levels 0-2 exist).
    pub fn file_path(&self, extension: &str) -> Result<PathBuf, InvalidGraphIdError> {
        let level_number = self.level();
        let Some(level) = STANDARD_LEVELS.get(level_number as usize) else {
            return Err(InvalidGraphIdError::Level);
        };

        let max_id = level.tiling_system.n_cols * level.tiling_system.n_rows - 1;
        let tile_id = self.tile_id();
        if tile_id > u64::from(max_id) {
            return Err(InvalidGraphIdError::GraphTileId);
        }

        let l = max_id.max(1).ilog10() + 1;
        let rem = l % 3;
        let n_digits = if rem == 0 { l } else { l + (3 - rem) };
        debug_assert!(n_digits % 3 == 0);

        // Format the tile ID with leading zeros, then group by threes.
        let padded_id = format!("{:0>width$}", tile_id, width = n_digits as usize);
        let tile_id_chars: Vec<_> = padded_id.chars().collect();
        let tile_id_component = tile_id_chars
            .rchunks(3)
            .fold(PathBuf::new(), |acc, chunk| {
                PathBuf::from(chunk.iter().collect::<String>()).join(acc)
            })
            .with_extension(extension);

        Ok(PathBuf::from(self.level().to_string()).join(tile_id_component))
    }
}

impl Display for GraphId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "GraphId {}/{}/{}",
            self.level(),
            self.tile_id(),
            self.index()
        ))
    }
}
