use std::collections::HashMap;

use geo::LineString;

use crate::error::EdgeError;
use crate::geometry::{polyline_distance, polyline_within_radius};
use crate::types::{Position, SegmentId};

/// Centerline of one drivable lane. Vertex order defines the shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadEdge {
    vertices: LineString<f64>,
}

impl RoadEdge {
    pub fn vertices(&self) -> &LineString<f64> {
        &self.vertices
    }

    pub fn distance_to(&self, point: &Position) -> f64 {
        polyline_distance(&self.vertices, point)
    }

    pub fn within_radius(&self, point: &Position, radius: f64) -> bool {
        polyline_within_radius(&self.vertices, point, radius)
    }
}

#[derive(Debug, Default)]
pub struct RoadEdgeIndex {
    edges: HashMap<SegmentId, RoadEdge>,
}

impl RoadEdgeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the shape of a segment, replacing any previous definition.
    pub fn add_edge(&mut self, segment_id: &str, vertices: Vec<Position>) -> Result<(), EdgeError> {
        if vertices.len() < 2 {
            return Err(EdgeError::DegenerateShape {
                segment_id: segment_id.to_string(),
                vertices: vertices.len(),
            });
        }
        let edge = RoadEdge { vertices: LineString::new(vertices) };
        if self.edges.insert(segment_id.to_string(), edge).is_some() {
            log::debug!("Segment {} redefined, keeping the latest shape", segment_id);
        }
        Ok(())
    }

    pub fn get(&self, segment_id: &str) -> Option<&RoadEdge> {
        self.edges.get(segment_id)
    }

    pub fn distance_to(&self, segment_id: &str, point: &Position) -> Option<f64> {
        self.get(segment_id).map(|edge| edge.distance_to(point))
    }

    pub fn within_radius(&self, segment_id: &str, point: &Position, radius: f64) -> Option<bool> {
        self.get(segment_id).map(|edge| edge.within_radius(point, radius))
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
