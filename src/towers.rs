use std::collections::HashMap;

use geo::Coord;

use crate::geometry::point_distance;
use crate::road_edges::RoadEdgeIndex;
use crate::types::{Position, Timestep, TowerId, VehicleId};

/// Returned by distance lookups when a vehicle was not recognized.
pub const NOT_RECOGNIZED: f64 = -1.0;

/// Everything one bluetooth tower recognized over a run.
#[derive(Debug, Clone, PartialEq)]
pub struct TowerRecognition {
    position: Position,
    // timestep -> vehicle -> distance to the tower
    recognitions: HashMap<Timestep, HashMap<VehicleId, f64>>,
}

impl Default for TowerRecognition {
    fn default() -> Self {
        TowerRecognition {
            position: Coord { x: 0.0, y: 0.0 },
            recognitions: HashMap::new(),
        }
    }
}

impl TowerRecognition {
    pub fn position(&self) -> Position {
        self.position
    }

    pub fn distance_at(&self, timestep: &str, vehicle_id: &str) -> f64 {
        self.recognitions
            .get(timestep)
            .and_then(|vehicles| vehicles.get(vehicle_id))
            .copied()
            .unwrap_or(NOT_RECOGNIZED)
    }

    pub fn distance_to(&self, point: &Position) -> f64 {
        point_distance(&self.position, point)
    }

    /// Number of (timestep, vehicle) pairs recorded.
    pub fn recognition_count(&self) -> usize {
        self.recognitions.values().map(HashMap::len).sum()
    }
}

#[derive(Debug, Default)]
pub struct TowerRecognitionIndex {
    towers: HashMap<TowerId, TowerRecognition>,
}

impl TowerRecognitionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&mut self, tower_id: &str) -> &mut TowerRecognition {
        if !self.towers.contains_key(tower_id) {
            log::debug!("New tower {}", tower_id);
        }
        self.towers.entry(tower_id.to_string()).or_default()
    }

    pub fn get(&self, tower_id: &str) -> Option<&TowerRecognition> {
        self.towers.get(tower_id)
    }

    /// Overwrites the position of an existing tower. Returns false if the tower is unknown.
    pub fn set_position(&mut self, tower_id: &str, position: Position) -> bool {
        match self.towers.get_mut(tower_id) {
            Some(tower) => {
                tower.position = position;
                true
            }
            None => {
                log::warn!("Position set for unknown tower {}", tower_id);
                false
            }
        }
    }

    pub fn add_recognition(&mut self, tower_id: &str, timestep: &str, vehicle_id: &str, distance: f64) {
        debug_assert!(distance.is_finite() && distance >= 0.0, "invalid distance {distance}");
        self.get_or_create(tower_id)
            .recognitions
            .entry(timestep.to_string())
            .or_default()
            .insert(vehicle_id.to_string(), distance);
    }

    /// Stored distance, or `NOT_RECOGNIZED` for unknown towers, timesteps and vehicles.
    pub fn distance_at(&self, tower_id: &str, timestep: &str, vehicle_id: &str) -> f64 {
        self.get(tower_id)
            .map_or(NOT_RECOGNIZED, |tower| tower.distance_at(timestep, vehicle_id))
    }

    /// Whether every vertex of the segment lies within `radius` of the tower.
    /// `None` if either id is unknown.
    pub fn covers_segment(
        &self,
        tower_id: &str,
        segment_id: &str,
        radius: f64,
        edges: &RoadEdgeIndex,
    ) -> Option<bool> {
        let tower = self.get(tower_id)?;
        edges.within_radius(segment_id, &tower.position, radius)
    }

    /// Distance from the tower to the nearest vertex of the segment.
    /// `None` if either id is unknown.
    pub fn distance_to_segment(&self, tower_id: &str, segment_id: &str, edges: &RoadEdgeIndex) -> Option<f64> {
        let tower = self.get(tower_id)?;
        edges.distance_to(segment_id, &tower.position)
    }

    pub fn len(&self) -> usize {
        self.towers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.towers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_towers_report_not_recognized() {
        let index = TowerRecognitionIndex::new();
        assert_eq!(index.distance_at("t1", "5", "v1"), NOT_RECOGNIZED);
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let mut index = TowerRecognitionIndex::new();
        index.get_or_create("t1");
        assert!(index.set_position("t1", Coord { x: 2.0, y: 3.0 }));
        let tower = index.get_or_create("t1");
        assert_eq!(tower.position(), Coord { x: 2.0, y: 3.0 });
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn new_towers_start_at_origin_without_recognitions() {
        let mut index = TowerRecognitionIndex::new();
        let tower = index.get_or_create("t1");
        assert_eq!(tower.position(), Coord { x: 0.0, y: 0.0 });
        assert_eq!(tower.recognition_count(), 0);
    }

    #[test]
    fn set_position_requires_existing_tower() {
        let mut index = TowerRecognitionIndex::new();
        assert!(!index.set_position("t1", Coord { x: 1.0, y: 1.0 }));
        assert!(index.is_empty());
    }

    #[test]
    fn recognitions_are_keyed_by_timestep_and_vehicle() {
        let mut index = TowerRecognitionIndex::new();
        index.add_recognition("t1", "5.00", "v1", 5.0);
        index.add_recognition("t1", "5.00", "v2", 0.0);
        index.add_recognition("t1", "6.00", "v1", 7.5);
        index.add_recognition("t1", "6.00", "v1", 8.25);

        assert_eq!(index.distance_at("t1", "5.00", "v1"), 5.0);
        assert_eq!(index.distance_at("t1", "5.00", "v2"), 0.0);
        assert_eq!(index.distance_at("t1", "6.00", "v1"), 8.25);
        assert_eq!(index.distance_at("t1", "6.00", "v2"), NOT_RECOGNIZED);
        assert_eq!(index.distance_at("t1", "7.00", "v1"), NOT_RECOGNIZED);
        // Timesteps are opaque, "5" and "5.00" are different keys
        assert_eq!(index.distance_at("t1", "5", "v1"), NOT_RECOGNIZED);
        assert_eq!(index.get("t1").unwrap().recognition_count(), 3);
    }

    #[test]
    fn coverage_queries_use_tower_position() {
        let mut edges = RoadEdgeIndex::new();
        edges
            .add_edge("e0_0", vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 10.0, y: 0.0 }])
            .unwrap();

        let mut index = TowerRecognitionIndex::new();
        index.get_or_create("t1");
        index.set_position("t1", Coord { x: 5.0, y: 0.0 });

        assert_eq!(index.covers_segment("t1", "e0_0", 4.0, &edges), Some(false));
        assert_eq!(index.covers_segment("t1", "e0_0", 6.0, &edges), Some(true));
        assert_eq!(index.distance_to_segment("t1", "e0_0", &edges), Some(5.0));

        assert_eq!(index.covers_segment("t2", "e0_0", 6.0, &edges), None);
        assert_eq!(index.covers_segment("t1", "e9_0", 6.0, &edges), None);
        assert_eq!(index.distance_to_segment("t1", "e9_0", &edges), None);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_recorded_distance_is_returned_exactly(
                tower in "[a-z]{1,6}",
                timestep in "[0-9]{1,4}\\.[0-9]{2}",
                vehicle in "[a-z0-9]{1,6}",
                distance in 0.0..1.0e6_f64,
            ) {
                let mut index = TowerRecognitionIndex::new();
                index.add_recognition(&tower, &timestep, &vehicle, distance);
                prop_assert_eq!(index.distance_at(&tower, &timestep, &vehicle), distance);
                prop_assert_eq!(index.distance_at(&format!("{tower}_x"), &timestep, &vehicle), NOT_RECOGNIZED);
            }
        }
    }
}
