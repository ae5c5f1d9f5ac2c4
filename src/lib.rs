use log::Level;
use wasm_bindgen::prelude::*;

pub mod error;
pub mod geometry;
pub mod ingest;
pub mod model;
pub mod registry;
pub mod report;
pub mod road_edges;
pub mod towers;
pub mod types;
pub mod vehicles;
pub mod xml_reader;

pub use self::error::{AnalysisError, EdgeError, IngestError, RecordError};
pub use self::model::{build_model, SimulationDocuments, SimulationModel};
pub use self::report::{render_reports, AnalysisReports};
pub use self::types::{AnalysisParams, CoverageMode};

#[wasm_bindgen]
pub fn rust_init() {
    if console_log::init_with_level(Level::Info).is_err() {
        log::warn!("Logger already initialized");
    }
    log::info!("Logger initialized from library");
}

pub fn parse_params(params_json: &str) -> Result<AnalysisParams, AnalysisError> {
    let params: AnalysisParams = if params_json.trim().is_empty() {
        AnalysisParams::default()
    } else {
        serde_json::from_str(params_json)?
    };
    if !params.coverage_radius.is_finite() || params.coverage_radius < 0.0 {
        return Err(AnalysisError::InvalidParams(format!(
            "coverage_radius must be a non-negative number, got {}",
            params.coverage_radius
        )));
    }
    if let Some(max) = params.max_history_elapsed {
        if !max.is_finite() || max < 0.0 {
            return Err(AnalysisError::InvalidParams(format!(
                "max_history_elapsed must be a non-negative number, got {}",
                max
            )));
        }
    }
    Ok(params)
}

/// Builds the indices for one simulation run and renders every report.
pub fn analyze_documents(params_json: &str, docs: SimulationDocuments<'_>) -> Result<AnalysisReports, AnalysisError> {
    let params = parse_params(params_json)?;
    log::info!(
        "Analyzing run: coverage radius {} ({:?})",
        params.coverage_radius,
        params.coverage_mode
    );

    let model = build_model(docs, &params)?;
    log::info!(
        "Model built: {} towers, {} segments, {} vehicles, {} timesteps",
        model.registries.towers.len(),
        model.registries.segments.len(),
        model.registries.vehicles.len(),
        model.registries.timesteps.len()
    );

    Ok(render_reports(&model, &params))
}

#[wasm_bindgen]
pub fn analyze(params: String, bt_output: String, network: String, netstate: String) -> Result<JsValue, JsValue> {
    let docs = SimulationDocuments { bt_output: &bt_output, network: &network, netstate: &netstate };
    let reports = analyze_documents(&params, docs).map_err(|e| JsValue::from_str(&e.to_string()))?;
    serde_wasm_bindgen::to_value(&reports)
        .map_err(|e| JsValue::from_str(&AnalysisError::Render(e.to_string()).to_string()))
}
