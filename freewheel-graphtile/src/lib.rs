//! # freewheel-graphtile
//!
//! Decoder, store, and builder for the tiled road-network graph format used
//! by the freewheel routing engine. Tiles are gzip-compressed fixed-binary
//! files addressed by a packed [`GraphId`]; entities inside a tile are
//! bit-packed and decoded lazily through zero-copy views.

pub mod endian;
mod graph_id;
pub mod graph_tile;
pub mod spatial;
pub mod tile_hierarchy;
pub mod tile_store;

use enumset::EnumSetType;

// Re-exported at the crate root to flatten the hierarchy for callers;
// most of them only ever need the ID type and the attribute enums.
pub use graph_id::{GraphId, InvalidGraphIdError};

/// Road class; broad hierarchies of relative importance.
///
/// The cost model uses this to estimate traffic stress when no better
/// signal is available.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RoadClass {
    Motorway,
    Trunk,
    Primary,
    Secondary,
    Tertiary,
    Unclassified,
    Residential,
    ServiceOther,
}

impl RoadClass {
    pub(crate) const fn from_bits(value: u8) -> Self {
        match value {
            0 => Self::Motorway,
            1 => Self::Trunk,
            2 => Self::Primary,
            3 => Self::Secondary,
            4 => Self::Tertiary,
            5 => Self::Unclassified,
            6 => Self::Residential,
            // The field is 3 bits wide, so this covers exactly 7.
            _ => Self::ServiceOther,
        }
    }

    pub const fn discriminant(self) -> u8 {
        self as u8
    }
}

/// Generalized surface type, ordered from best to worst.
///
/// The bicycle cost model refuses edges that are "too rough" for the
/// configured bicycle type, so the ordering is load-bearing.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum Surface {
    PavedSmooth,
    Paved,
    PavedRough,
    Compacted,
    Dirt,
    Gravel,
    Path,
    Impassable,
}

impl Surface {
    pub(crate) const fn from_bits(value: u8) -> Self {
        match value {
            0 => Self::PavedSmooth,
            1 => Self::Paved,
            2 => Self::PavedRough,
            3 => Self::Compacted,
            4 => Self::Dirt,
            5 => Self::Gravel,
            6 => Self::Path,
            _ => Self::Impassable,
        }
    }

    pub const fn discriminant(self) -> u8 {
        self as u8
    }
}

/// Sub-categorization of roads based on specialized usage.
///
/// Stored as a 6-bit field. The listed values are the ones written by the
/// tile production pipeline; anything else decodes as [`RoadUse::Other`].
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RoadUse {
    /// Standard road (the default).
    Road = 0,
    /// Entrance or exit ramp.
    Ramp = 1,
    /// Turn lane.
    TurnChannel = 2,
    /// Agricultural use, forest tracks, and some unspecified rough roads.
    Track = 3,
    /// Driveway or private service road.
    Driveway = 4,
    Alley = 5,
    ParkingAisle = 6,
    EmergencyAccess = 7,
    DriveThru = 8,
    CulDeSac = 9,
    /// Streets with preference towards bicyclists and pedestrians.
    LivingStreet = 10,
    /// A generic service road.
    ServiceRoad = 11,
    /// A dedicated bicycle path.
    Cycleway = 20,
    /// A mountain bike trail.
    MountainBike = 21,
    Sidewalk = 24,
    /// A road with pedestrian priority; bicycles may be granted access.
    Footway = 25,
    /// A stairway/steps.
    Steps = 26,
    Path = 27,
    Pedestrian = 28,
    Bridleway = 29,
    RestArea = 30,
    ServiceArea = 31,
    PedestrianCrossing = 32,
    Other = 40,
    Ferry = 41,
    RailFerry = 42,
    Construction = 43,
}

impl RoadUse {
    pub(crate) const fn from_bits(value: u8) -> Self {
        match value {
            0 => Self::Road,
            1 => Self::Ramp,
            2 => Self::TurnChannel,
            3 => Self::Track,
            4 => Self::Driveway,
            5 => Self::Alley,
            6 => Self::ParkingAisle,
            7 => Self::EmergencyAccess,
            8 => Self::DriveThru,
            9 => Self::CulDeSac,
            10 => Self::LivingStreet,
            11 => Self::ServiceRoad,
            20 => Self::Cycleway,
            21 => Self::MountainBike,
            24 => Self::Sidewalk,
            25 => Self::Footway,
            26 => Self::Steps,
            27 => Self::Path,
            28 => Self::Pedestrian,
            29 => Self::Bridleway,
            30 => Self::RestArea,
            31 => Self::ServiceArea,
            32 => Self::PedestrianCrossing,
            41 => Self::Ferry,
            42 => Self::RailFerry,
            43 => Self::Construction,
            _ => Self::Other,
        }
    }

    pub const fn into_bits(self) -> u8 {
        self as u8
    }
}

/// Access permission by travel type.
///
/// Stored internally as a bit field. NOTE: directed edges only have room
/// for TWELVE bits, so this enum must never grow past twelve variants.
#[derive(Debug, EnumSetType)]
#[enumset(repr = "u16")]
pub enum Access {
    Auto,
    Pedestrian,
    Bicycle,
    Truck,
    Emergency,
    Taxi,
    Bus,
    HOV,
    Wheelchair,
    Moped,
    Motorcycle,
    GolfCart,
}

#[cfg(test)]
mod tests {
    use super::*;
    use enumset::EnumSet;

    #[test]
    fn test_access_bit_positions() {
        // The on-disk format assigns auto=1, pedestrian=2, bicycle=4.
        assert_eq!(EnumSet::only(Access::Auto).as_repr(), 1);
        assert_eq!(EnumSet::only(Access::Pedestrian).as_repr(), 2);
        assert_eq!(EnumSet::only(Access::Bicycle).as_repr(), 4);
    }

    #[test]
    fn test_all_access_fits_in_twelve_bits() {
        let set: EnumSet<Access> = EnumSet::all();
        assert_eq!(set.len(), 12);
        assert_eq!(set.as_repr(), 4095);
    }

    #[test]
    fn test_surface_ordering() {
        assert!(Surface::Impassable > Surface::Path);
        assert!(Surface::Paved < Surface::Gravel);
        assert_eq!(Surface::from_bits(4), Surface::Dirt);
    }

    #[test]
    fn test_unknown_road_use_decodes_as_other() {
        assert_eq!(RoadUse::from_bits(17), RoadUse::Other);
        assert_eq!(RoadUse::from_bits(63), RoadUse::Other);
        assert_eq!(RoadUse::from_bits(20), RoadUse::Cycleway);
    }
}
