use geo::LineString;

use crate::types::Position;

pub fn point_distance(a: &Position, b: &Position) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

/// Distance from `point` to the nearest vertex of `polyline`.
///
/// Only vertices are sampled, segment interiors are not projected onto.
/// An empty polyline yields `f64::MAX`.
pub fn polyline_distance(polyline: &LineString<f64>, point: &Position) -> f64 {
    polyline
        .coords()
        .map(|vertex| point_distance(vertex, point))
        .fold(f64::MAX, f64::min)
}

/// Whether every vertex of `polyline` lies within `radius` of `point`.
pub fn polyline_within_radius(polyline: &LineString<f64>, point: &Position, radius: f64) -> bool {
    polyline
        .coords()
        .all(|vertex| point_distance(vertex, point) <= radius)
}
