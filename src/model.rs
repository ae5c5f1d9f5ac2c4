use crate::error::AnalysisError;
use crate::ingest::{occupancy_pass, recognition_pass, topology_pass};
use crate::registry::Registries;
use crate::road_edges::RoadEdgeIndex;
use crate::towers::TowerRecognitionIndex;
use crate::types::{AnalysisParams, RoleClassifier};
use crate::vehicles::VehicleHistoryIndex;

/// Raw contents of the three simulation exports.
#[derive(Debug, Clone, Copy)]
pub struct SimulationDocuments<'a> {
    pub bt_output: &'a str,
    pub network: &'a str,
    pub netstate: &'a str,
}

/// Indices built from one simulation run, read by the report stage.
#[derive(Debug, Default)]
pub struct SimulationModel {
    pub towers: TowerRecognitionIndex,
    pub edges: RoadEdgeIndex,
    pub vehicles: VehicleHistoryIndex,
    pub registries: Registries,
}

/// Runs the three ingestion passes side by side and joins their indices.
pub fn build_model(docs: SimulationDocuments<'_>, params: &AnalysisParams) -> Result<SimulationModel, AnalysisError> {
    let classifier = RoleClassifier::new(params.tower_prefix.as_str());

    // Each pass owns its index, nothing is shared until the join
    let (recognitions, (topology, occupancy)) = rayon::join(
        || recognition_pass(docs.bt_output, &classifier),
        || {
            rayon::join(
                || topology_pass(docs.network),
                || occupancy_pass(docs.netstate, &classifier),
            )
        },
    );

    let (towers, tower_ids) = recognitions.map_err(|source| AnalysisError::Ingest { pass: "recognition", source })?;
    let (edges, segment_ids) = topology.map_err(|source| AnalysisError::Ingest { pass: "topology", source })?;
    let (vehicles, vehicle_ids) = occupancy.map_err(|source| AnalysisError::Ingest { pass: "occupancy", source })?;

    Ok(SimulationModel {
        towers,
        edges,
        vehicles,
        registries: tower_ids.merge(segment_ids).merge(vehicle_ids),
    })
}
