use crate::error::{IngestError, RecordError};
use crate::geometry::point_distance;
use crate::registry::Registries;
use crate::road_edges::RoadEdgeIndex;
use crate::towers::TowerRecognitionIndex;
use crate::types::{EntityKind, OccupancyRecord, RecognitionRecord, RoleClassifier, SegmentRecord};
use crate::vehicles::VehicleHistoryIndex;
use crate::xml_reader::{parse_occupancy, parse_recognitions, parse_topology};

pub fn apply_recognitions(
    records: Vec<RecognitionRecord>,
    classifier: &RoleClassifier,
    towers: &mut TowerRecognitionIndex,
    registries: &mut Registries,
) {
    let mut applied = 0;
    let mut infrastructure = 0;
    for record in records {
        towers.get_or_create(&record.tower_id);
        towers.set_position(&record.tower_id, record.tower_position);
        registries.towers.record(&record.tower_id);

        for sighting in record.sightings {
            if classifier.classify(&sighting.vehicle_id) == EntityKind::Tower {
                infrastructure += 1;
                continue;
            }
            let distance = point_distance(&record.tower_position, &sighting.position);
            if !distance.is_finite() {
                let err = RecordError::UnmeasurableDistance {
                    tower_id: record.tower_id.clone(),
                    vehicle_id: sighting.vehicle_id.clone(),
                };
                log::warn!("Skipping recognition at {}: {}", sighting.timestep, err);
                continue;
            }
            towers.add_recognition(&record.tower_id, &sighting.timestep, &sighting.vehicle_id, distance);
            registries.vehicles.record(&sighting.vehicle_id);
            registries.timesteps.record(&sighting.timestep);
            applied += 1;
        }
    }
    log::info!(
        "Recognitions: {} towers, {} recognitions, {} tower-to-tower sightings ignored",
        towers.len(),
        applied,
        infrastructure
    );
}

pub fn apply_topology(records: Vec<SegmentRecord>, edges: &mut RoadEdgeIndex, registries: &mut Registries) {
    let mut internal = 0;
    let mut rejected = 0;
    for record in records {
        if record.is_internal {
            internal += 1;
            continue;
        }
        match edges.add_edge(&record.segment_id, record.vertices) {
            Ok(()) => registries.segments.record(&record.segment_id),
            Err(err) => {
                log::warn!("Skipping segment: {}", err);
                rejected += 1;
            }
        }
    }
    log::info!(
        "Topology: {} segments, {} internal skipped, {} rejected",
        edges.len(),
        internal,
        rejected
    );
}

pub fn apply_occupancy(
    records: Vec<OccupancyRecord>,
    classifier: &RoleClassifier,
    vehicles: &mut VehicleHistoryIndex,
    registries: &mut Registries,
) {
    let mut observations = 0;
    for record in records {
        registries.timesteps.record(&record.timestep);
        for lane in record.lanes {
            for vehicle_id in lane.vehicle_ids {
                if classifier.classify(&vehicle_id) == EntityKind::Tower {
                    continue;
                }
                vehicles.observe(&vehicle_id, &lane.segment_id, record.time);
                registries.vehicles.record(&vehicle_id);
                observations += 1;
            }
        }
    }
    log::info!("Occupancy: {} vehicles, {} observations", vehicles.len(), observations);
}

// ** Passes **

pub fn recognition_pass(
    xml: &str,
    classifier: &RoleClassifier,
) -> Result<(TowerRecognitionIndex, Registries), IngestError> {
    let records = parse_recognitions(xml)?;
    let mut towers = TowerRecognitionIndex::new();
    let mut registries = Registries::default();
    apply_recognitions(records, classifier, &mut towers, &mut registries);
    Ok((towers, registries))
}

pub fn topology_pass(xml: &str) -> Result<(RoadEdgeIndex, Registries), IngestError> {
    let records = parse_topology(xml)?;
    let mut edges = RoadEdgeIndex::new();
    let mut registries = Registries::default();
    apply_topology(records, &mut edges, &mut registries);
    Ok((edges, registries))
}

pub fn occupancy_pass(
    xml: &str,
    classifier: &RoleClassifier,
) -> Result<(VehicleHistoryIndex, Registries), IngestError> {
    let records = parse_occupancy(xml)?;
    let mut vehicles = VehicleHistoryIndex::new();
    let mut registries = Registries::default();
    apply_occupancy(records, classifier, &mut vehicles, &mut registries);
    Ok((vehicles, registries))
}
