use std::collections::HashMap;

use crate::types::{SegmentId, VehicleId};

/// Returned by recency lookups when a vehicle was never on the segment.
pub const NEVER_SEEN: f64 = -1.0;

/// Segments a vehicle has been on and the last timestep it was seen there.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleSegmentHistory {
    last_seen: HashMap<SegmentId, f64>,
}

impl VehicleSegmentHistory {
    pub fn at_segment(&mut self, segment_id: &str, timestep: f64) {
        self.last_seen.insert(segment_id.to_string(), timestep);
    }

    pub fn timesteps_since(&self, segment_id: &str, current_ts: f64) -> f64 {
        self.last_seen
            .get(segment_id)
            .map_or(NEVER_SEEN, |last| current_ts - last)
    }

    pub fn segments(&self) -> impl Iterator<Item = (&str, f64)> {
        self.last_seen.iter().map(|(segment, ts)| (segment.as_str(), *ts))
    }
}

#[derive(Debug, Default)]
pub struct VehicleHistoryIndex {
    vehicles: HashMap<VehicleId, VehicleSegmentHistory>,
}

impl VehicleHistoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the vehicle on the segment. The latest call wins, whatever its timestep.
    pub fn observe(&mut self, vehicle_id: &str, segment_id: &str, timestep: f64) {
        self.vehicles
            .entry(vehicle_id.to_string())
            .or_default()
            .at_segment(segment_id, timestep);
    }

    pub fn get(&self, vehicle_id: &str) -> Option<&VehicleSegmentHistory> {
        self.vehicles.get(vehicle_id)
    }

    /// `current_ts` minus the last timestep on the segment, or `NEVER_SEEN`.
    pub fn timesteps_since(&self, vehicle_id: &str, segment_id: &str, current_ts: f64) -> f64 {
        self.get(vehicle_id)
            .map_or(NEVER_SEEN, |history| history.timesteps_since(segment_id, current_ts))
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}
