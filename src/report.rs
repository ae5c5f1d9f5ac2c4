//! Report documents rendered from a built [`SimulationModel`].
//!
//! Rendering only goes through the index query methods. Timesteps are
//! walked in numeric order and ids in registry order, so every known
//! tower/vehicle/segment shows up even if it was never observed.

use std::collections::HashMap;

use geo::{BoundingRect, LineString, Point, Rect};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::AnalysisError;
use crate::model::SimulationModel;
use crate::types::{AnalysisParams, CoverageMode};

// ** Tower recognitions **

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TowerReport {
    pub vehicle_ids: Vec<String>,
    pub towers: Vec<TowerRecognitions>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TowerRecognitions {
    pub tower_id: String,
    pub vehicles: Vec<TimestepDistances>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimestepDistances {
    pub ts: f64,
    // [vehicle index, distance to tower]
    pub v: Vec<[f64; 2]>,
}

// ** Vehicle segment history **

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleReport {
    pub segments: Vec<String>,
    pub vehicles: Vec<VehicleSegments>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleSegments {
    pub vehicle_id: String,
    pub segments: Vec<TimestepHistory>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimestepHistory {
    pub ts: f64,
    // [segment index, timesteps since the vehicle was last on it]
    pub s: Vec<[f64; 2]>,
}

// ** Segment coverage **

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentReport {
    pub segments: Vec<String>,
    pub towers: Vec<TowerCoverage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TowerCoverage {
    pub tower_id: String,
    pub segments: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReports {
    pub towers: TowerReport,
    pub vehicles: VehicleReport,
    pub segments: SegmentReport,
    pub coverage_map: GeoJson,
}

impl AnalysisReports {
    pub fn to_json(&self) -> Result<String, AnalysisError> {
        serde_json::to_string(self).map_err(|e| AnalysisError::Render(e.to_string()))
    }
}

pub fn render_reports(model: &SimulationModel, params: &AnalysisParams) -> AnalysisReports {
    let segments = segment_coverage(model, params);
    let coverage_map = coverage_map(model, &segments);
    AnalysisReports {
        towers: tower_recognitions(model),
        vehicles: vehicle_history(model, params.max_history_elapsed),
        segments,
        coverage_map,
    }
}

pub fn tower_recognitions(model: &SimulationModel) -> TowerReport {
    let vehicle_ids: Vec<&str> = model.registries.vehicles.iter().collect();
    let timesteps = model.registries.sorted_timesteps();

    let towers = model
        .registries
        .towers
        .iter()
        .map(|tower_id| TowerRecognitions {
            tower_id: tower_id.to_string(),
            vehicles: timesteps
                .iter()
                .map(|&(ts, raw)| TimestepDistances {
                    ts,
                    v: vehicle_ids
                        .iter()
                        .enumerate()
                        .filter_map(|(index, vehicle_id)| {
                            let distance = model.towers.distance_at(tower_id, raw, vehicle_id);
                            (distance >= 0.0).then_some([index as f64, distance])
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    TowerReport {
        vehicle_ids: vehicle_ids.into_iter().map(str::to_string).collect(),
        towers,
    }
}

pub fn vehicle_history(model: &SimulationModel, max_elapsed: Option<f64>) -> VehicleReport {
    let segment_ids: Vec<&str> = model.registries.segments.iter().collect();
    let segment_index: HashMap<&str, usize> =
        segment_ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let timesteps = model.registries.sorted_timesteps();

    let mut vehicles = Vec::new();
    for vehicle_id in model.registries.vehicles.iter() {
        // Vehicles only seen by towers have no history and get an empty entry
        let mut visited: Vec<(usize, &str)> = model
            .vehicles
            .get(vehicle_id)
            .map(|history| {
                history
                    .segments()
                    .filter_map(|(segment_id, _)| segment_index.get(segment_id).map(|&i| (i, segment_id)))
                    .collect()
            })
            .unwrap_or_default();
        visited.sort_unstable();

        let segments = timesteps
            .iter()
            .filter_map(|&(ts, _)| {
                let s: Vec<[f64; 2]> = visited
                    .iter()
                    .filter_map(|&(index, segment_id)| {
                        let elapsed = model.vehicles.timesteps_since(vehicle_id, segment_id, ts);
                        let in_window = max_elapsed.map_or(true, |max| elapsed <= max);
                        (elapsed >= 0.0 && in_window).then_some([index as f64, elapsed])
                    })
                    .collect();
                (!s.is_empty()).then_some(TimestepHistory { ts, s })
            })
            .collect();

        vehicles.push(VehicleSegments { vehicle_id: vehicle_id.to_string(), segments });
    }

    VehicleReport {
        segments: segment_ids.into_iter().map(str::to_string).collect(),
        vehicles,
    }
}

fn covers(model: &SimulationModel, params: &AnalysisParams, tower_id: &str, segment_id: &str) -> Option<bool> {
    let radius = params.coverage_radius;
    match params.coverage_mode {
        CoverageMode::AllVertices => model.towers.covers_segment(tower_id, segment_id, radius, &model.edges),
        CoverageMode::NearestVertex => model
            .towers
            .distance_to_segment(tower_id, segment_id, &model.edges)
            .map(|distance| distance <= radius),
    }
}

pub fn segment_coverage(model: &SimulationModel, params: &AnalysisParams) -> SegmentReport {
    let segment_ids: Vec<&str> = model.registries.segments.iter().collect();

    let towers = model
        .registries
        .towers
        .iter()
        .map(|tower_id| {
            let mut covered = Vec::new();
            for (index, segment_id) in segment_ids.iter().enumerate() {
                match covers(model, params, tower_id, segment_id) {
                    Some(true) => covered.push(index),
                    Some(false) => {}
                    None => log::warn!("No coverage for tower {} on segment {}", tower_id, segment_id),
                }
            }
            log::debug!("Tower {} covers {} segments", tower_id, covered.len());
            TowerCoverage { tower_id: tower_id.to_string(), segments: covered }
        })
        .collect();

    SegmentReport {
        segments: segment_ids.into_iter().map(str::to_string).collect(),
        towers,
    }
}

// ** Coverage map **

fn properties(entries: &[(&str, &str)]) -> JsonObject {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), JsonValue::from(*value)))
        .collect()
}

fn extend_bounds(bounds: Option<Rect<f64>>, other: Option<Rect<f64>>) -> Option<Rect<f64>> {
    match (bounds, other) {
        (Some(a), Some(b)) => Some(Rect::new(
            geo::Coord { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
            geo::Coord { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
        )),
        (a, b) => a.or(b),
    }
}

/// GeoJSON with a point per tower and a line per covered segment.
pub fn coverage_map(model: &SimulationModel, coverage: &SegmentReport) -> GeoJson {
    let mut features = Vec::new();
    let mut bounds: Option<Rect<f64>> = None;

    for tower_coverage in &coverage.towers {
        let Some(tower) = model.towers.get(&tower_coverage.tower_id) else { continue };
        let point = Point::from(tower.position());
        bounds = extend_bounds(bounds, Some(point.bounding_rect()));
        features.push(Feature {
            geometry: Some(Geometry::new(Value::from(&point))),
            properties: Some(properties(&[("kind", "tower"), ("tower_id", tower_coverage.tower_id.as_str())])),
            ..Default::default()
        });

        for &index in &tower_coverage.segments {
            let segment_id = &coverage.segments[index];
            let Some(edge) = model.edges.get(segment_id) else { continue };
            let line: &LineString<f64> = edge.vertices();
            bounds = extend_bounds(bounds, line.bounding_rect());
            features.push(Feature {
                geometry: Some(Geometry::new(Value::from(line))),
                properties: Some(properties(&[
                    ("kind", "segment"),
                    ("segment_id", segment_id.as_str()),
                    ("tower_id", tower_coverage.tower_id.as_str()),
                ])),
                ..Default::default()
            });
        }
    }

    GeoJson::FeatureCollection(FeatureCollection {
        bbox: bounds.map(|rect| vec![rect.min().x, rect.min().y, rect.max().x, rect.max().y]),
        features,
        foreign_members: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{build_model, SimulationDocuments};

    const BT_OUTPUT: &str = r#"<bt-output>
        <bt id="t1">
            <seen id="v1">
                <recognitionPoint t="5.00" observerPos="5,0" seenPos="5,3"/>
                <recognitionPoint t="10.00" observerPos="5,0" seenPos="5,4"/>
            </seen>
        </bt>
        <bt id="t2">
            <seen id="v2"><recognitionPoint t="10.00" observerPos="100,0" seenPos="100,0"/></seen>
        </bt>
    </bt-output>"#;
    const NETWORK: &str = r#"<net>
        <edge id=":j0" function="internal"><lane id=":j0_0" shape="10,0 10,1"/></edge>
        <edge id="a"><lane id="a_0" shape="0,0 10,0"/></edge>
        <edge id="b"><lane id="b_0" shape="0,0 5,20"/></edge>
    </net>"#;
    const NETSTATE: &str = r#"<netstate>
        <timestep time="5.00">
            <edge id="a"><lane id="a_0"><vehicle id="v1"/></lane></edge>
        </timestep>
        <timestep time="10.00">
            <edge id="b"><lane id="b_0"><vehicle id="v1"/></lane></edge>
            <edge id=":j0"><lane id=":j0_0"><vehicle id="v2"/><vehicle id="tower_9"/></lane></edge>
        </timestep>
    </netstate>"#;

    fn model(params: &AnalysisParams) -> SimulationModel {
        let docs = SimulationDocuments { bt_output: BT_OUTPUT, network: NETWORK, netstate: NETSTATE };
        build_model(docs, params).unwrap()
    }

    #[test]
    fn tower_report_lists_every_timestep() {
        let report = tower_recognitions(&model(&AnalysisParams::default()));
        assert_eq!(report.vehicle_ids, vec!["v1", "v2"]);

        let t1 = &report.towers[0];
        assert_eq!(t1.tower_id, "t1");
        assert_eq!(
            t1.vehicles,
            vec![
                TimestepDistances { ts: 5.0, v: vec![[0.0, 3.0]] },
                TimestepDistances { ts: 10.0, v: vec![[0.0, 4.0]] },
            ]
        );

        let t2 = &report.towers[1];
        assert_eq!(t2.vehicles[0], TimestepDistances { ts: 5.0, v: vec![] });
        assert_eq!(t2.vehicles[1], TimestepDistances { ts: 10.0, v: vec![[1.0, 0.0]] });
    }

    #[test]
    fn vehicle_report_measures_elapsed_timesteps() {
        let report = vehicle_history(&model(&AnalysisParams::default()), None);
        assert_eq!(report.segments, vec!["a_0", "b_0"]);
        // tower_9 is infrastructure, v2 was only on an internal lane
        assert_eq!(report.vehicles.len(), 2);
        assert_eq!(report.vehicles[1], VehicleSegments { vehicle_id: "v2".to_string(), segments: vec![] });

        let v1 = &report.vehicles[0];
        assert_eq!(v1.vehicle_id, "v1");
        assert_eq!(
            v1.segments,
            vec![
                TimestepHistory { ts: 5.0, s: vec![[0.0, 0.0]] },
                TimestepHistory { ts: 10.0, s: vec![[0.0, 5.0], [1.0, 0.0]] },
            ]
        );

        let windowed = vehicle_history(&model(&AnalysisParams::default()), Some(2.0));
        assert_eq!(
            windowed.vehicles[0].segments[1],
            TimestepHistory { ts: 10.0, s: vec![[1.0, 0.0]] }
        );
    }

    #[test]
    fn coverage_follows_configured_mode() {
        let all = AnalysisParams { coverage_radius: 6.0, ..AnalysisParams::default() };
        let report = segment_coverage(&model(&all), &all);
        assert_eq!(report.segments, vec!["a_0", "b_0"]);
        assert_eq!(report.towers[0], TowerCoverage { tower_id: "t1".to_string(), segments: vec![0] });
        assert!(report.towers[1].segments.is_empty());

        let nearest = AnalysisParams {
            coverage_radius: 6.0,
            coverage_mode: CoverageMode::NearestVertex,
            ..AnalysisParams::default()
        };
        let report = segment_coverage(&model(&nearest), &nearest);
        assert_eq!(report.towers[0].segments, vec![0, 1]);
    }

    #[test]
    fn coverage_map_has_towers_and_covered_segments() {
        let params = AnalysisParams { coverage_radius: 6.0, ..AnalysisParams::default() };
        let model = model(&params);
        let coverage = segment_coverage(&model, &params);

        let GeoJson::FeatureCollection(collection) = coverage_map(&model, &coverage) else {
            panic!("expected a feature collection");
        };
        // t1 + a_0, t2 alone
        assert_eq!(collection.features.len(), 3);
        assert_eq!(collection.bbox, Some(vec![0.0, 0.0, 100.0, 0.0]));

        let segment = &collection.features[1];
        let props = segment.properties.as_ref().unwrap();
        assert_eq!(props["segment_id"], "a_0");
        assert_eq!(props["tower_id"], "t1");
    }

    #[test]
    fn reports_serialize_in_consumer_layout() {
        let params = AnalysisParams::default();
        let reports = render_reports(&model(&params), &params);
        let json: JsonValue = serde_json::from_str(&reports.to_json().unwrap()).unwrap();

        assert_eq!(json["towers"]["vehicle_ids"][0], "v1");
        assert_eq!(json["towers"]["towers"][0]["vehicles"][0]["v"][0][1], 3.0);
        assert_eq!(json["vehicles"]["vehicles"][0]["segments"][1]["s"][0][1], 5.0);
        assert_eq!(json["segments"]["towers"][0]["tower_id"], "t1");
        assert_eq!(json["coverage_map"]["type"], "FeatureCollection");
    }
}
