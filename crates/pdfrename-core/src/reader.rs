//! Document Model Reader
//!
//! Turns raw bytes into a [`PdfGraph`]. Cross-reference tables,
//! cross-reference streams and incremental updates chained through `/Prev`
//! are handled by `lopdf`, which keeps the most recent definition of each
//! object number. This module adds the structural checks the rename pipeline
//! relies on.

use lopdf::Document;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::PdfRenameError;
use crate::graph::PdfGraph;

/// The header may be preceded by junk, but only within the first kilobyte.
pub const HEADER_SEARCH_WINDOW: usize = 1024;

/// `startxref` must appear within this many bytes of the end of file.
pub const TRAILER_SEARCH_WINDOW: usize = 4096;

/// What to do with references to objects that do not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DanglingReferences {
    /// Fail with `MalformedDocument`
    #[default]
    Reject,
    /// Replace them with `null`, as ISO 32000 readers do
    Nullify,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    pub dangling_references: DanglingReferences,
}

/// Parse PDF bytes with default options
pub fn parse(bytes: &[u8]) -> Result<PdfGraph, PdfRenameError> {
    parse_with(bytes, &ReaderOptions::default())
}

/// Parse PDF bytes into an object graph
///
/// Fails with `MalformedDocument` when the header signature or trailer is
/// missing, the catalog cannot be resolved, or (in `Reject` mode) any
/// reference points at an undefined object. Encrypted documents are
/// `Unsupported`.
pub fn parse_with(bytes: &[u8], options: &ReaderOptions) -> Result<PdfGraph, PdfRenameError> {
    if !has_header_signature(bytes) {
        return Err(PdfRenameError::MalformedDocument(
            "missing %PDF- header signature".into(),
        ));
    }

    if !has_trailer_marker(bytes) {
        return Err(PdfRenameError::MalformedDocument(
            "no startxref marker near end of file".into(),
        ));
    }

    let doc = Document::load_mem(bytes).map_err(|e| {
        PdfRenameError::MalformedDocument(format!("failed to load cross-reference data: {}", e))
    })?;

    if doc.trailer.has(b"Encrypt") {
        return Err(PdfRenameError::Unsupported(
            "encrypted documents cannot be rewritten".into(),
        ));
    }

    let mut graph = PdfGraph::from_document(doc);

    if graph.catalog().is_none() {
        return Err(PdfRenameError::MalformedDocument(
            "trailer has no resolvable /Root catalog".into(),
        ));
    }

    let dangling = graph.dangling_references();
    if let Some(&(num, gen)) = dangling.iter().next() {
        match options.dangling_references {
            DanglingReferences::Reject => {
                return Err(PdfRenameError::MalformedDocument(format!(
                    "object {} {} R is referenced but not defined ({} unresolvable reference(s))",
                    num,
                    gen,
                    dangling.len()
                )));
            }
            DanglingReferences::Nullify => {
                let replaced = graph.nullify_references(&dangling);
                warn!(
                    objects = dangling.len(),
                    replaced, "replaced unresolvable references with null"
                );
            }
        }
    }

    debug!(
        version = graph.version(),
        objects = graph.object_count(),
        "parsed PDF object graph"
    );

    Ok(graph)
}

fn has_header_signature(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    find(window, b"%PDF-").is_some()
}

fn has_trailer_marker(bytes: &[u8]) -> bool {
    let start = bytes.len().saturating_sub(TRAILER_SEARCH_WINDOW);
    find(&bytes[start..], b"startxref").is_some()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
