//! # JSON Format
//!
//! Pretty-printed [`SerializableArtifact`]. Unlike the outline format it keeps
//! element ids, tombstones and the id counter, so a reduced JSON artifact can
//! be fed back in without renumbering.

use super::Codec;
use crate::artifact::SerializableArtifact;
use crate::{Artifact, PareError};

/// Codec for the JSON format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn parse(&self, bytes: &[u8]) -> Result<Artifact, PareError> {
        let serializable: SerializableArtifact =
            serde_json::from_slice(bytes).map_err(|e| PareError::Parse {
                line: e.line(),
                message: e.to_string(),
            })?;
        Artifact::try_from(serializable)
    }

    fn render(&self, artifact: &Artifact) -> Result<Vec<u8>, PareError> {
        let mut bytes = serde_json::to_vec_pretty(&SerializableArtifact::from(artifact))
            .map_err(|e| PareError::Serialization(e.to_string()))?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ElementId, Kind, Reference, repair};

    #[test]
    fn keeps_tombstones_and_counter() {
        let mut b = Artifact::builder();
        let a = b.element(None, Kind::new("fn"), "a").expect("a");
        let c = b.element(None, Kind::new("fn"), "c").expect("c");
        b.reference(c, Reference::to(a)).expect("ref");
        let artifact = b.build().expect("build");
        let reduced = repair::remove(&artifact, &[a]).expect("repair").artifact;

        let bytes = JsonCodec.render(&reduced).expect("render");
        let restored = JsonCodec.parse(&bytes).expect("parse");

        assert!(restored.is_tombstoned(ElementId(0)));
        assert_eq!(restored.next_id(), 2);
        assert_eq!(restored, reduced);
    }

    #[test]
    fn rejects_dangling_reference() {
        let json = r#"{
            "elements": [
                {"id": 0, "kind": "fn", "name": "a", "parent": null, "children": [],
                 "references": [{"target": {"Element": 7}, "shape": "any", "required": false}]}
            ],
            "roots": [0],
            "next_id": 1
        }"#;
        assert!(matches!(
            JsonCodec.parse(json.as_bytes()),
            Err(PareError::RepairAnomaly { .. })
        ));
    }

    #[test]
    fn rejects_broken_hierarchy() {
        // a and b own each other, c is listed twice as a root
        let json = r#"{
            "elements": [
                {"id": 0, "kind": "fn", "name": "a", "parent": 1, "children": [1], "references": []},
                {"id": 1, "kind": "fn", "name": "b", "parent": 0, "children": [0], "references": []},
                {"id": 2, "kind": "fn", "name": "c", "parent": null, "children": [], "references": []}
            ],
            "roots": [2, 2],
            "next_id": 3
        }"#;
        assert!(matches!(
            JsonCodec.parse(json.as_bytes()),
            Err(PareError::Inconsistent { .. })
        ));

        let detached = r#""parent": null, "children": []"#;
        let acyclic_duplicate = json
            .replace(r#""parent": 1, "children": [1]"#, detached)
            .replace(r#""parent": 0, "children": [0]"#, detached)
            .replace("[2, 2]", "[0, 1, 2, 2]");
        assert!(matches!(
            JsonCodec.parse(acyclic_duplicate.as_bytes()),
            Err(PareError::Inconsistent { element: ElementId(2), .. })
        ));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(
            JsonCodec.parse(b"{ not json"),
            Err(PareError::Parse { .. })
        ));
    }
}
