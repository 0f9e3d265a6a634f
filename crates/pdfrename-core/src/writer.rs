//! Document Writer
//!
//! Serializes a [`PdfGraph`] as one complete PDF indexed by a single fresh
//! cross-reference stream, which `lopdf` numbers one past the highest object.
//! Object numbers and generations are kept as they are in the graph, so every
//! reference stays valid.

use lopdf::{Dictionary, Object};
use tracing::debug;

use crate::error::PdfRenameError;
use crate::graph::PdfGraph;

/// Trailer entries that describe the input's cross-reference layout and
/// would be stale in the rewritten file.
const STALE_TRAILER_KEYS: &[&[u8]] = &[
    b"Prev",
    b"XRefStm",
    b"Type",
    b"W",
    b"Index",
    b"Filter",
    b"DecodeParms",
    b"Length",
];

/// Serialize the graph to PDF bytes.
///
/// Cross-reference streams and object streams left over from parsing are
/// dropped first: their contents already live in the graph as ordinary
/// objects and a new cross-reference stream is generated on save. Numbers
/// freed at the top of the range are reused for it, so repeated round trips
/// do not grow `/Size`.
pub fn serialize(graph: &mut PdfGraph) -> Result<Vec<u8>, PdfRenameError> {
    let dropped = drop_container_streams(graph);

    let doc = graph.document_mut();
    for key in STALE_TRAILER_KEYS {
        doc.trailer.remove(key);
    }
    doc.max_id = doc.objects.keys().map(|&(num, _)| num).max().unwrap_or(0);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfRenameError::Serialization(e.to_string()))?;

    debug!(
        bytes = buffer.len(),
        objects = graph.object_count(),
        dropped,
        "serialized PDF"
    );

    Ok(buffer)
}

fn drop_container_streams(graph: &mut PdfGraph) -> usize {
    let containers: Vec<_> = graph
        .ids()
        .filter(|&id| match graph.get(id) {
            Some(Object::Stream(stream)) => is_container(&stream.dict),
            _ => false,
        })
        .collect();

    let doc = graph.document_mut();
    for id in &containers {
        doc.objects.remove(id);
    }
    containers.len()
}

fn is_container(dict: &Dictionary) -> bool {
    matches!(
        dict.get(b"Type"),
        Ok(Object::Name(name)) if name.as_slice() == b"XRef" || name.as_slice() == b"ObjStm"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldIndex;
    use crate::reader::parse;
    use crate::test_support::{form_pdf, FieldSpec};
    use lopdf::{dictionary, Stream};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serialize_round_trips_field_listing() {
        let pdf = form_pdf(&[
            FieldSpec::text("name"),
            FieldSpec::checkbox("agree"),
            FieldSpec::group("address", vec![FieldSpec::text("city")]),
        ]);
        let mut graph = parse(&pdf).unwrap();
        let before = FieldIndex::build(&graph).unwrap().summaries();

        let bytes = serialize(&mut graph).unwrap();
        let after = FieldIndex::build(&parse(&bytes).unwrap()).unwrap().summaries();
        assert_eq!(before, after);
    }

    fn object_ids(graph: &PdfGraph) -> Vec<lopdf::ObjectId> {
        graph
            .ids()
            .filter(|&id| match graph.get(id) {
                Some(Object::Stream(stream)) => !is_container(&stream.dict),
                _ => true,
            })
            .collect()
    }

    fn trailer_size(graph: &PdfGraph) -> i64 {
        match graph.trailer().get(b"Size") {
            Ok(Object::Integer(size)) => *size,
            other => panic!("unexpected /Size: {:?}", other),
        }
    }

    #[test]
    fn test_object_numbers_preserved() {
        let pdf = form_pdf(&[FieldSpec::radio("choice", 3)]);
        let mut graph = parse(&pdf).unwrap();
        let before = object_ids(&graph);

        let bytes = serialize(&mut graph).unwrap();
        let reparsed = parse(&bytes).unwrap();
        assert_eq!(before, object_ids(&reparsed));
    }

    #[test]
    fn test_repeated_round_trips_keep_size_stable() {
        let pdf = form_pdf(&[FieldSpec::text("name"), FieldSpec::checkbox("agree")]);
        let mut first = parse(&pdf).unwrap();
        let mut second = parse(&serialize(&mut first).unwrap()).unwrap();
        let third = parse(&serialize(&mut second).unwrap()).unwrap();

        assert_eq!(trailer_size(&second), trailer_size(&third));
        assert_eq!(object_ids(&second), object_ids(&third));
    }

    #[test]
    fn test_output_has_single_revision() {
        let pdf = form_pdf(&[FieldSpec::text("name")]);
        let mut graph = parse(&pdf).unwrap();
        graph.document_mut().trailer.set("Prev", Object::Integer(1234));

        let bytes = serialize(&mut graph).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert_eq!(text.matches("startxref").count(), 1);
        assert!(!graph.trailer().has(b"Prev"));
    }

    #[test]
    fn test_stale_container_streams_dropped() {
        let pdf = form_pdf(&[FieldSpec::text("name")]);
        let mut graph = parse(&pdf).unwrap();
        let objstm = graph.document_mut().add_object(Stream::new(
            dictionary! { "Type" => "ObjStm", "N" => 0, "First" => 0 },
            Vec::new(),
        ));
        let appearance = graph.document_mut().add_object(Stream::new(
            dictionary! { "Type" => "XObject", "Subtype" => "Form" },
            b"q Q".to_vec(),
        ));

        let bytes = serialize(&mut graph).unwrap();
        let reparsed = parse(&bytes).unwrap();
        assert!(!reparsed.contains(objstm));
        assert!(reparsed.contains(appearance));
    }
}
