//! # Bicycle costing
//!
//! Collapses a family of cyclist preferences into a single scalar cost per
//! traversed edge. The cost approximates traversal time in seconds,
//! multiplied by a preference factor, so "fastest" routes still favor
//! calm, bike-friendly infrastructure.

use freewheel_graphtile::graph_tile::DirectedEdge;
use freewheel_graphtile::{Access, RoadUse, Surface};

/// Cost assigned to degenerate (zero-length) edges so they never win.
const UNREACHABLE_COST: f32 = 1e9;

/// Assumed walking speed on stairways, km/h.
const STEPS_WALKING_SPEED_KPH: f32 = 4.0;

/// Stairways are time-costed at walking speed, tripled.
const STEPS_PENALTY: f32 = 3.0;

/// Ferries run at their posted speed with a modest inconvenience penalty.
const FERRY_PENALTY: f32 = 1.2;

/// Walking speed when an edge demands dismounting, km/h.
const DISMOUNT_SPEED_KPH: f32 = 5.1;

/// Cycling speed is clamped to this range after all adjustments, km/h.
const MIN_SPEED_KPH: f32 = 4.0;
const MAX_SPEED_KPH: f32 = 40.0;

/// Preference bonus for edges on a signed bicycle network.
const BIKE_NETWORK_FACTOR: f32 = 0.95;

/// Speed scaling by weighted grade bucket (0 steep downhill, 7 flat,
/// 15 steep uphill).
const GRADE_SPEED_FACTOR: [f32; 16] = [
    2.2, 2.0, 1.9, 1.7, 1.4, 1.2, 1.0, 1.0, 0.85, 0.75, 0.65, 0.55, 0.5, 0.45, 0.4, 0.3,
];

/// Speed scaling by surface, one row per bicycle type. The mountain row
/// is the most tolerant of rough ground.
const SURFACE_SPEED_FACTOR: [[f32; 8]; 4] = [
    [1.0, 1.0, 0.9, 0.6, 0.5, 0.3, 0.2, 0.0],
    [1.0, 1.0, 1.0, 0.8, 0.7, 0.5, 0.4, 0.0],
    [1.0, 1.0, 1.0, 0.8, 0.6, 0.4, 0.25, 0.0],
    [1.0, 1.0, 1.0, 1.0, 0.9, 0.75, 0.55, 0.0],
];

/// Seconds per meter at the given speed in km/h.
#[inline]
fn speed_factor(speed_kph: f32) -> f32 {
    3.6 / speed_kph
}

/// The kind of bicycle being ridden.
///
/// Determines base speed, surface tolerance, and which surfaces are
/// refused outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BicycleType {
    Road = 0,
    Cross = 1,
    Hybrid = 2,
    #[default]
    Mountain = 3,
}

impl BicycleType {
    /// Maps the wire/CLI index to a type, clamping out-of-range values to
    /// the most capable bicycle.
    pub const fn from_index(index: u8) -> Self {
        match index {
            0 => Self::Road,
            1 => Self::Cross,
            2 => Self::Hybrid,
            _ => Self::Mountain,
        }
    }

    /// Typical unhindered cruising speed in km/h.
    pub const fn default_speed_kph(self) -> f32 {
        match self {
            Self::Road => 25.0,
            Self::Cross => 20.0,
            Self::Hybrid => 18.0,
            Self::Mountain => 16.0,
        }
    }

    /// The roughest surface this bicycle will be routed over.
    pub const fn worst_allowed_surface(self) -> Surface {
        match self {
            Self::Road => Surface::PavedRough,
            Self::Cross => Surface::Compacted,
            Self::Hybrid => Surface::Dirt,
            Self::Mountain => Surface::Path,
        }
    }

    const fn surface_speed_factors(self) -> &'static [f32; 8] {
        &SURFACE_SPEED_FACTOR[self as usize]
    }
}

/// User-tunable routing preferences.
#[derive(Debug, Clone, Copy)]
pub struct CostingOptions {
    pub bicycle_type: BicycleType,
    /// Willingness to ride on plain roads, 0 (avoid) to 1 (no penalty).
    pub use_roads: f32,
    /// Strongly penalize segments that require walking the bike.
    pub avoid_pushing: bool,
    /// Penalize car-accessible edges by estimated traffic stress.
    pub avoid_cars: bool,
}

impl Default for CostingOptions {
    fn default() -> Self {
        Self {
            bicycle_type: BicycleType::Mountain,
            use_roads: 0.25,
            avoid_pushing: false,
            avoid_cars: false,
        }
    }
}

/// The per-edge scalar cost function.
pub struct CostModel {
    options: CostingOptions,
}

impl CostModel {
    pub fn new(mut options: CostingOptions) -> Self {
        options.use_roads = options.use_roads.clamp(0.0, 1.0);
        Self { options }
    }

    pub fn options(&self) -> &CostingOptions {
        &self.options
    }

    /// May the search expand this edge at all?
    ///
    /// Requires bicycle or pedestrian access (pedestrian-only edges are
    /// walkable with the bike), and refuses surfaces rougher than the
    /// bicycle type tolerates.
    pub fn is_traversable(&self, edge: &DirectedEdge) -> bool {
        let access = edge.access_union();
        if !access.contains(Access::Bicycle) && !access.contains(Access::Pedestrian) {
            return false;
        }
        edge.surface() <= self.options.bicycle_type.worst_allowed_surface()
    }

    /// Must this edge be walked rather than ridden?
    pub fn is_pushing(edge: &DirectedEdge) -> bool {
        let access = edge.access_union();
        !access.contains(Access::Bicycle) && access.contains(Access::Pedestrian)
    }

    /// Scalar cost of traversing the edge: seconds of travel time scaled
    /// by the preference multiplier. Non-negative; both search directions
    /// use the same value (edges are undirected for cycling).
    #[allow(clippy::cast_precision_loss)]
    pub fn edge_cost(&self, edge: &DirectedEdge) -> f32 {
        let length = edge.length_m() as f32;
        if length <= 0.0 {
            return UNREACHABLE_COST;
        }

        // Steps and ferries bypass the cycling speed model entirely.
        match edge.edge_use() {
            RoadUse::Steps => {
                return length * speed_factor(STEPS_WALKING_SPEED_KPH) * STEPS_PENALTY;
            }
            RoadUse::Ferry => {
                return length * speed_factor(f32::from(edge.speed_kph())) * FERRY_PENALTY;
            }
            _ => {}
        }

        let bicycle_type = self.options.bicycle_type;
        let grade = usize::from(edge.weighted_grade().min(15));
        let surface = usize::from(edge.surface().discriminant());

        let mut speed_kph = bicycle_type.default_speed_kph()
            * bicycle_type.surface_speed_factors()[surface]
            * GRADE_SPEED_FACTOR[grade];
        if edge.requires_dismount() {
            speed_kph = DISMOUNT_SPEED_KPH;
        }
        let speed_kph = speed_kph.clamp(MIN_SPEED_KPH, MAX_SPEED_KPH);

        let time_cost = length / (speed_kph / 3.6);

        let mut preference = match edge.edge_use() {
            RoadUse::Cycleway | RoadUse::Track => 0.9,
            RoadUse::MountainBike if bicycle_type == BicycleType::Mountain => 0.85,
            RoadUse::Path | RoadUse::Footway | RoadUse::LivingStreet => 0.95,
            RoadUse::Road => {
                let mut road = 1.0 + (1.0 - self.options.use_roads) * 0.15;
                if edge.cycle_lane() >= 2 {
                    road -= 0.1;
                }
                road
            }
            _ => 1.0,
        };

        if edge.is_bike_network() {
            preference *= BIKE_NETWORK_FACTOR;
        }

        // Applied after the base cost so pushing segments are penalized
        // consistently in both search directions.
        if Self::is_pushing(edge) {
            preference *= if self.options.avoid_pushing { 5.0 } else { 2.0 };
        }

        if self.options.avoid_cars && edge.access_union().contains(Access::Auto) {
            preference *= self.car_stress_factor(edge);
        }

        time_cost * preference
    }

    /// Stress-based penalty for sharing the road with cars.
    fn car_stress_factor(&self, edge: &DirectedEdge) -> f32 {
        // Low-traffic categories barely register.
        if matches!(
            edge.edge_use(),
            RoadUse::Track | RoadUse::LivingStreet | RoadUse::ServiceRoad
        ) {
            return 1.05;
        }

        let mut stress: f32 = 0.2;
        if edge.speed_kph() > 50 {
            stress += 0.3;
        }
        if edge.speed_kph() > 70 {
            stress += 0.3;
        }
        if edge.classification().discriminant() <= 2 {
            stress += 0.2;
        }
        if edge.lane_count() >= 2 {
            stress += 0.1;
        }
        if edge.cycle_lane() >= 2 {
            stress -= 0.3;
        }
        let stress = stress.clamp(0.1, 1.0);
        1.0 + stress * 0.5
    }

    /// A* heuristic scale: cost per meter of straight-line distance.
    ///
    /// Geodesic distance divided by twice the bicycle's default speed is a
    /// clear underestimate of true cost (no preference multiplier falls
    /// below 0.85), which keeps the search admissible and the
    /// bidirectional termination guard sound.
    pub fn heuristic_cost_per_meter(&self) -> f32 {
        speed_factor(2.0 * self.options.bicycle_type.default_speed_kph())
    }
}
