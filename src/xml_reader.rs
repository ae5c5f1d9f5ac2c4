//! Turns the three simulation exports into record streams.
//!
//! Syntax errors and a wrong root element fail the whole document. A record
//! with missing or unparsable attributes is logged and skipped, the rest of the
//! document is still read.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{IngestError, RecordError};
use crate::types::{
    parse_position, parse_shape, timestep_value, LaneOccupancy, OccupancyRecord, Position,
    RecognitionRecord, SegmentRecord, Sighting, VehicleId,
};

pub const BT_OUTPUT_ROOT: &str = "bt-output";
pub const NETWORK_ROOT: &str = "net";
pub const NETSTATE_ROOT: &str = "netstate";

const INTERNAL_FUNCTION: &str = "internal";

// ** Attribute access **

struct Attrs(HashMap<String, String>);

impl Attrs {
    fn read(element: &BytesStart<'_>) -> Result<Attrs, quick_xml::Error> {
        let mut values = HashMap::new();
        for attr in element.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            values.insert(key, attr.unescape_value()?.into_owned());
        }
        Ok(Attrs(values))
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    fn required(&self, element: &'static str, attribute: &'static str) -> Result<&str, RecordError> {
        self.get(attribute)
            .ok_or(RecordError::MissingAttribute { element, attribute })
    }

    fn position(&self, element: &'static str, attribute: &'static str) -> Result<Position, RecordError> {
        let value = self.required(element, attribute)?;
        parse_position(value).ok_or_else(|| RecordError::InvalidPosition {
            element,
            value: value.to_string(),
        })
    }
}

// ** Element stream **

enum Node {
    Open { name: String, attrs: Attrs },
    Close { name: String },
}

/// Walks the elements below a checked root element.
struct NodeReader<'a> {
    reader: Reader<&'a [u8]>,
    // Self-closing elements are reported as an open followed by a close
    pending_close: Option<String>,
    depth: usize,
}

impl<'a> NodeReader<'a> {
    fn open(xml: &'a str, root: &'static str) -> Result<Self, IngestError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);
        let mut nodes = NodeReader { reader, pending_close: None, depth: 0 };

        match nodes.next_raw()? {
            Some(Node::Open { name, .. }) if name == root => Ok(nodes),
            Some(Node::Open { name, .. }) => Err(IngestError::UnexpectedRoot { expected: root, found: name }),
            _ => Err(IngestError::EmptyDocument),
        }
    }

    /// Next element below the root, `None` once the root is closed.
    fn next_node(&mut self) -> Result<Option<Node>, IngestError> {
        match self.next_raw()? {
            Some(Node::Close { .. }) if self.depth == 0 => Ok(None),
            node => Ok(node),
        }
    }

    fn next_raw(&mut self) -> Result<Option<Node>, IngestError> {
        if let Some(name) = self.pending_close.take() {
            self.depth -= 1;
            return Ok(Some(Node::Close { name }));
        }
        loop {
            let position = self.reader.buffer_position();
            let to_ingest_error = move |source: quick_xml::Error| IngestError::Xml { position, source };
            let event = self.reader.read_event().map_err(to_ingest_error)?;
            match event {
                Event::Start(element) => {
                    self.depth += 1;
                    return Ok(Some(Node::Open {
                        name: element_name(&element),
                        attrs: Attrs::read(&element).map_err(to_ingest_error)?,
                    }));
                }
                Event::Empty(element) => {
                    self.depth += 1;
                    let name = element_name(&element);
                    self.pending_close = Some(name.clone());
                    return Ok(Some(Node::Open {
                        name,
                        attrs: Attrs::read(&element).map_err(to_ingest_error)?,
                    }));
                }
                Event::End(element) => {
                    self.depth = self.depth.saturating_sub(1);
                    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
                    return Ok(Some(Node::Close { name }));
                }
                Event::Eof if self.depth > 0 => return Err(IngestError::Truncated { open: self.depth }),
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }
}

fn element_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.name().as_ref()).into_owned()
}

// ** Recognition log **

struct TowerDraft {
    tower_id: Result<String, RecordError>,
    position: Option<Position>,
    sightings: Vec<Sighting>,
}

impl TowerDraft {
    fn finish(self) -> Result<RecognitionRecord, RecordError> {
        let tower_id = self.tower_id?;
        let tower_position = self.position.ok_or(RecordError::MissingAttribute {
            element: "recognitionPoint",
            attribute: "observerPos",
        })?;
        Ok(RecognitionRecord { tower_id, tower_position, sightings: self.sightings })
    }
}

fn sighting(vehicle_id: &str, attrs: &Attrs) -> Result<Sighting, RecordError> {
    Ok(Sighting {
        vehicle_id: vehicle_id.to_string(),
        timestep: attrs.required("recognitionPoint", "t")?.to_string(),
        position: attrs.position("recognitionPoint", "seenPos")?,
    })
}

pub fn parse_recognitions(xml: &str) -> Result<Vec<RecognitionRecord>, IngestError> {
    let mut nodes = NodeReader::open(xml, BT_OUTPUT_ROOT)?;
    let mut records = Vec::new();
    let mut tower: Option<TowerDraft> = None;
    let mut seen_id: Option<VehicleId> = None;

    while let Some(node) = nodes.next_node()? {
        match node {
            Node::Open { name, attrs } => match name.as_str() {
                "bt" => {
                    tower = Some(TowerDraft {
                        tower_id: attrs.required("bt", "id").map(str::to_string),
                        position: None,
                        sightings: Vec::new(),
                    });
                }
                "seen" => match attrs.required("seen", "id") {
                    Ok(id) => seen_id = Some(id.to_string()),
                    Err(err) => {
                        log::warn!("Skipping recognitions: {}", err);
                        seen_id = None;
                    }
                },
                "recognitionPoint" => {
                    let Some(draft) = tower.as_mut() else { continue };
                    if draft.position.is_none() {
                        draft.position = attrs.position("recognitionPoint", "observerPos").ok();
                    }
                    if let Some(vehicle_id) = seen_id.as_deref() {
                        match sighting(vehicle_id, &attrs) {
                            Ok(sighting) => draft.sightings.push(sighting),
                            Err(err) => log::warn!("Skipping recognition of {}: {}", vehicle_id, err),
                        }
                    }
                }
                _ => {}
            },
            Node::Close { name } => match name.as_str() {
                "bt" => {
                    if let Some(draft) = tower.take() {
                        match draft.finish() {
                            Ok(record) => records.push(record),
                            Err(err) => log::warn!("Skipping tower record: {}", err),
                        }
                    }
                }
                "seen" => seen_id = None,
                _ => {}
            },
        }
    }
    Ok(records)
}

// ** Network topology **

fn segment(attrs: &Attrs, is_internal: bool) -> Result<SegmentRecord, RecordError> {
    let segment_id = attrs.required("lane", "id")?;
    let shape = attrs.required("lane", "shape")?;
    let vertices = parse_shape(shape).ok_or_else(|| RecordError::InvalidPosition {
        element: "lane",
        value: shape.to_string(),
    })?;
    Ok(SegmentRecord { segment_id: segment_id.to_string(), is_internal, vertices })
}

pub fn parse_topology(xml: &str) -> Result<Vec<SegmentRecord>, IngestError> {
    let mut nodes = NodeReader::open(xml, NETWORK_ROOT)?;
    let mut records = Vec::new();
    let mut in_edge = false;
    let mut internal_edge = false;

    while let Some(node) = nodes.next_node()? {
        match node {
            Node::Open { name, attrs } => match name.as_str() {
                "edge" => {
                    in_edge = true;
                    internal_edge = attrs.get("function") == Some(INTERNAL_FUNCTION);
                }
                "lane" if in_edge => match segment(&attrs, internal_edge) {
                    Ok(record) => records.push(record),
                    Err(err) => log::warn!("Skipping lane: {}", err),
                },
                _ => {}
            },
            Node::Close { name } => {
                if name == "edge" {
                    in_edge = false;
                    internal_edge = false;
                }
            }
        }
    }
    Ok(records)
}

// ** Occupancy log **

fn occupancy_timestep(attrs: &Attrs) -> Result<OccupancyRecord, RecordError> {
    let raw = attrs.required("timestep", "time")?;
    let time = timestep_value(raw).ok_or_else(|| RecordError::InvalidTimestep {
        element: "timestep",
        value: raw.to_string(),
    })?;
    Ok(OccupancyRecord { timestep: raw.to_string(), time, lanes: Vec::new() })
}

pub fn parse_occupancy(xml: &str) -> Result<Vec<OccupancyRecord>, IngestError> {
    let mut nodes = NodeReader::open(xml, NETSTATE_ROOT)?;
    let mut records = Vec::new();
    let mut timestep: Option<OccupancyRecord> = None;
    let mut lane: Option<LaneOccupancy> = None;

    while let Some(node) = nodes.next_node()? {
        match node {
            Node::Open { name, attrs } => match name.as_str() {
                "timestep" => match occupancy_timestep(&attrs) {
                    Ok(record) => timestep = Some(record),
                    Err(err) => {
                        log::warn!("Skipping timestep: {}", err);
                        timestep = None;
                    }
                },
                "lane" if timestep.is_some() => match attrs.required("lane", "id") {
                    Ok(id) => {
                        lane = Some(LaneOccupancy { segment_id: id.to_string(), vehicle_ids: Vec::new() })
                    }
                    Err(err) => log::warn!("Skipping lane occupancy: {}", err),
                },
                "vehicle" => {
                    let Some(current) = lane.as_mut() else { continue };
                    match attrs.required("vehicle", "id") {
                        Ok(id) => current.vehicle_ids.push(id.to_string()),
                        Err(err) => log::warn!("Skipping vehicle on {}: {}", current.segment_id, err),
                    }
                }
                _ => {}
            },
            Node::Close { name } => match name.as_str() {
                "lane" => {
                    if let (Some(record), Some(finished)) = (timestep.as_mut(), lane.take()) {
                        record.lanes.push(finished);
                    }
                }
                "timestep" => {
                    lane = None;
                    if let Some(record) = timestep.take() {
                        records.push(record);
                    }
                }
                _ => {}
            },
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;

    const BT_OUTPUT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<bt-output>
    <bt id="tower_0">
        <seen id="veh0" tBeg="5.00" tEnd="6.00">
            <recognitionPoint t="5.00" observerPos="0.00,0.00" seenPos="3.00,4.00"/>
            <recognitionPoint t="6.00" observerPos="0.00,0.00" seenPos="6.00,8.00"/>
        </seen>
        <seen tBeg="5.00">
            <recognitionPoint t="5.00" observerPos="0.00,0.00" seenPos="1.00,1.00"/>
        </seen>
        <seen id="veh1">
            <recognitionPoint t="5.00" observerPos="0.00,0.00" seenPos="broken"/>
            <recognitionPoint observerPos="0.00,0.00" seenPos="1.00,1.00"/>
        </seen>
    </bt>
    <bt>
        <seen id="veh0">
            <recognitionPoint t="5.00" observerPos="1.00,1.00" seenPos="3.00,4.00"/>
        </seen>
    </bt>
    <bt id="tower_1"></bt>
</bt-output>"#;

    #[test]
    fn reads_towers_and_sightings() {
        let records = parse_recognitions(BT_OUTPUT).unwrap();
        assert_eq!(records.len(), 1);

        let tower = &records[0];
        assert_eq!(tower.tower_id, "tower_0");
        assert_eq!(tower.tower_position, Coord { x: 0.0, y: 0.0 });
        assert_eq!(
            tower.sightings,
            vec![
                Sighting {
                    vehicle_id: "veh0".to_string(),
                    timestep: "5.00".to_string(),
                    position: Coord { x: 3.0, y: 4.0 },
                },
                Sighting {
                    vehicle_id: "veh0".to_string(),
                    timestep: "6.00".to_string(),
                    position: Coord { x: 6.0, y: 8.0 },
                },
            ]
        );
    }

    #[test]
    fn reads_lanes_with_internal_flag() {
        let net = r#"<net version="1.9">
            <location netOffset="0.00,0.00"/>
            <edge id=":j0_0" function="internal">
                <lane id=":j0_0_0" index="0" shape="10.00,0.00 10.00,1.00"/>
            </edge>
            <edge id="e0" from="j1" to="j0">
                <lane id="e0_0" index="0" shape="0.00,0.00 3.00,4.00 10.00,0.00"/>
                <lane id="e0_1" index="1" shape="0.00,1.00 x"/>
                <lane index="2" shape="0.00,2.00 10.00,2.00"/>
            </edge>
            <junction id="j0" x="10.00" y="0.00"/>
        </net>"#;

        let records = parse_topology(net).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].segment_id, ":j0_0_0");
        assert!(records[0].is_internal);
        assert_eq!(records[1].segment_id, "e0_0");
        assert!(!records[1].is_internal);
        assert_eq!(records[1].vertices.len(), 3);
    }

    #[test]
    fn reads_occupancy_per_timestep() {
        let netstate = r#"<netstate>
            <timestep time="0.00">
                <edge id="e0">
                    <lane id="e0_0">
                        <vehicle id="veh0" pos="1.00" speed="0.00"/>
                        <vehicle id="veh1" pos="5.00" speed="0.00"/>
                    </lane>
                    <lane id="e0_1"><vehicle pos="2.00"/></lane>
                </edge>
            </timestep>
            <timestep time="soon"><edge id="e0"><lane id="e0_0"><vehicle id="veh0"/></lane></edge></timestep>
            <timestep time="1.00"/>
        </netstate>"#;

        let records = parse_occupancy(netstate).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestep, "0.00");
        assert_eq!(records[0].time, 0.0);
        assert_eq!(
            records[0].lanes,
            vec![
                LaneOccupancy {
                    segment_id: "e0_0".to_string(),
                    vehicle_ids: vec!["veh0".to_string(), "veh1".to_string()],
                },
                LaneOccupancy { segment_id: "e0_1".to_string(), vehicle_ids: vec![] },
            ]
        );
        assert_eq!(records[1].timestep, "1.00");
        assert!(records[1].lanes.is_empty());
    }

    #[test]
    fn wrong_root_is_structural() {
        let err = parse_occupancy("<fcd-export></fcd-export>").unwrap_err();
        match err {
            IngestError::UnexpectedRoot { expected, found } => {
                assert_eq!(expected, NETSTATE_ROOT);
                assert_eq!(found, "fcd-export");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_document_is_structural() {
        assert!(matches!(parse_topology(""), Err(IngestError::EmptyDocument)));
        assert!(matches!(
            parse_topology("<?xml version=\"1.0\"?>"),
            Err(IngestError::EmptyDocument)
        ));
    }

    #[test]
    fn truncated_document_is_structural() {
        let err = parse_occupancy("<netstate><timestep time=\"0.00\">").unwrap_err();
        assert!(matches!(err, IngestError::Truncated { open: 2 }));
    }

    #[test]
    fn malformed_xml_is_structural() {
        let err = parse_recognitions("<bt-output><bt id=\"t\"></seen></bt-output>").unwrap_err();
        assert!(matches!(err, IngestError::Xml { .. }));
    }
}
