//! pdfrename-core: AcroForm field listing and bulk field renaming
//!
//! The pipeline is `parse -> FieldIndex::build -> rename -> serialize`.
//! [`analyze`] and [`rename_document`] run it end to end on raw bytes.

pub mod error;
pub mod fields;
pub mod graph;
pub mod reader;
pub mod rename;
pub mod text;
pub mod writer;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::{FieldNotFound, PdfRenameError};
pub use fields::{FieldIndex, FieldKind, FieldSummary, FormField, WidgetAnnotation};
pub use graph::PdfGraph;
pub use reader::{parse, parse_with, DanglingReferences, ReaderOptions};
pub use rename::{rename, AppliedRename, RenameMapping, RenameOptions, RenameReport};
pub use writer::serialize;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Options for a full rename run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    pub reader: ReaderOptions,
    pub rename: RenameOptions,
}

/// Result of [`rename_document`]
#[derive(Debug, Clone)]
pub struct RenameOutcome {
    pub pdf: Vec<u8>,
    pub report: RenameReport,
}

/// List the terminal fields of a PDF in declaration order.
pub fn analyze(bytes: &[u8]) -> Result<Vec<FieldSummary>, PdfRenameError> {
    analyze_with(bytes, &ReaderOptions::default())
}

pub fn analyze_with(
    bytes: &[u8],
    options: &ReaderOptions,
) -> Result<Vec<FieldSummary>, PdfRenameError> {
    let graph = parse_with(bytes, options)?;
    let index = FieldIndex::build(&graph)?;
    let fields = index.summaries();
    info!(fields = fields.len(), "analyzed form");
    Ok(fields)
}

/// Apply `mapping` to a PDF and return the rewritten bytes.
///
/// Nothing is produced unless the whole batch validates.
pub fn rename_document(
    bytes: &[u8],
    mapping: &RenameMapping,
    options: &PipelineOptions,
) -> Result<RenameOutcome, PdfRenameError> {
    let mut graph = parse_with(bytes, &options.reader)?;
    let index = FieldIndex::build(&graph)?;
    let report = rename(&mut graph, &index, mapping, &options.rename)?;
    let pdf = serialize(&mut graph)?;
    Ok(RenameOutcome { pdf, report })
}
