use thiserror::Error;

use crate::types::SegmentId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EdgeError {
    #[error("segment {segment_id} has a degenerate shape ({vertices} vertices, need at least 2)")]
    DegenerateShape { segment_id: SegmentId, vertices: usize },
}

/// Structural failures: the whole ingestion pass is unusable.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed xml at byte {position}: {source}")]
    Xml {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },
    #[error("unexpected root element: expected <{expected}>, found <{found}>")]
    UnexpectedRoot { expected: &'static str, found: String },
    #[error("document has no root element")]
    EmptyDocument,
    #[error("document ended with {open} unclosed elements")]
    Truncated { open: usize },
}

/// Record-level failures: logged, the record is dropped and ingestion continues.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("<{element}> is missing attribute `{attribute}`")]
    MissingAttribute { element: &'static str, attribute: &'static str },
    #[error("<{element}> has an unparsable position `{value}`")]
    InvalidPosition { element: &'static str, value: String },
    #[error("<{element}> has an unparsable timestep `{value}`")]
    InvalidTimestep { element: &'static str, value: String },
    #[error("distance from tower {tower_id} to {vehicle_id} is not finite")]
    UnmeasurableDistance { tower_id: String, vehicle_id: String },
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid analysis parameters: {0}")]
    InvalidParams(String),
    #[error("{pass} pass failed: {source}")]
    Ingest {
        pass: &'static str,
        #[source]
        source: IngestError,
    },
    #[error("failed to render reports: {0}")]
    Render(String),
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::InvalidParams(err.to_string())
    }
}
