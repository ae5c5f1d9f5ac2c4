use geo::Coord;
use serde::Deserialize;

// ** Identifiers **

pub type TowerId = String;
pub type VehicleId = String;
pub type SegmentId = String;

// Timesteps are kept verbatim so the exported formatting round-trips;
// use `timestep_value` when arithmetic is needed.
pub type Timestep = String;

pub fn timestep_value(timestep: &str) -> Option<f64> {
    timestep.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

// ** Coordinates **

pub type Position = Coord<f64>;

/// Parses a single `x,y` pair as written in the simulation exports.
pub fn parse_position(text: &str) -> Option<Position> {
    let (x, y) = text.trim().split_once(',')?;
    let x = x.trim().parse::<f64>().ok()?;
    let y = y.trim().parse::<f64>().ok()?;
    if x.is_finite() && y.is_finite() {
        Some(Coord { x, y })
    } else {
        None
    }
}

/// Parses a space separated list of `x,y` pairs. Fails if any pair is malformed.
pub fn parse_shape(text: &str) -> Option<Vec<Position>> {
    text.split_whitespace().map(parse_position).collect()
}

// ** Entity roles **

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Vehicle,
    // Towers that also appear as simulated agents to report their position
    Tower,
}

/// Tags ids from the position logs with their role, once, at ingestion.
#[derive(Debug, Clone)]
pub struct RoleClassifier {
    tower_prefix: String,
}

impl RoleClassifier {
    pub fn new(tower_prefix: impl Into<String>) -> Self {
        RoleClassifier { tower_prefix: tower_prefix.into() }
    }

    pub fn classify(&self, id: &str) -> EntityKind {
        if !self.tower_prefix.is_empty() && id.starts_with(&self.tower_prefix) {
            EntityKind::Tower
        } else {
            EntityKind::Vehicle
        }
    }
}

// ** Ingestion records **

// A vehicle seen by a tower at one timestep
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    pub vehicle_id: VehicleId,
    pub timestep: Timestep,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionRecord {
    pub tower_id: TowerId,
    pub tower_position: Position,
    pub sightings: Vec<Sighting>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRecord {
    pub segment_id: SegmentId,
    pub is_internal: bool,
    pub vertices: Vec<Position>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaneOccupancy {
    pub segment_id: SegmentId,
    pub vehicle_ids: Vec<VehicleId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyRecord {
    pub timestep: Timestep,
    pub time: f64,
    pub lanes: Vec<LaneOccupancy>,
}

// ** Parameters **

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CoverageMode {
    // Every vertex of the segment must lie within the radius
    #[default]
    AllVertices,
    // The nearest vertex of the segment must lie within the radius
    NearestVertex,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisParams {
    pub coverage_radius: f64,
    pub coverage_mode: CoverageMode,
    pub tower_prefix: String,
    pub max_history_elapsed: Option<f64>,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        AnalysisParams {
            coverage_radius: 50.0,
            coverage_mode: CoverageMode::AllVertices,
            tower_prefix: "tower".to_string(),
            max_history_elapsed: None,
        }
    }
}
