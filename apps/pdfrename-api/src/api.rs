//! API handlers for the pdfrename server
//!
//! Provides REST endpoints for:
//! - Listing the form fields of a PDF
//! - Renaming form fields in bulk

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use pdfrename_core::{
    analyze_with, rename_document, AppliedRename, FieldSummary, PdfRenameError, RenameMapping,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "pdfrename-api",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Analyze request body
#[derive(Deserialize)]
pub struct AnalyzeRequest {
    /// Base64-encoded PDF, optionally as a `data:` URL
    pub pdf: String,
}

#[derive(Serialize)]
pub struct AnalyzeResponse {
    pub fields: Vec<FieldSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Handler: POST /api/analyze
///
/// A readable PDF without a form yields an empty field list with the
/// reason attached, not an error status.
pub async fn handle_analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let Json(request) = payload?;
    let bytes = decode_pdf(&request.pdf)?;
    debug!(bytes = bytes.len(), "analyze request");

    let reader = state.options.reader.clone();
    let result = tokio::task::spawn_blocking(move || analyze_with(&bytes, &reader)).await?;

    match result {
        Ok(fields) => {
            info!(fields = fields.len(), "analyzed PDF");
            Ok(Json(AnalyzeResponse {
                fields,
                error: None,
                details: None,
            }))
        }
        Err(err @ PdfRenameError::NoForm(_)) => {
            info!("PDF has no form");
            Ok(Json(AnalyzeResponse {
                fields: Vec::new(),
                error: Some("No form fields found in PDF".to_string()),
                details: Some(err.to_string()),
            }))
        }
        Err(err) => Err(err.into()),
    }
}

/// Rename request body
#[derive(Deserialize)]
pub struct RenameRequest {
    /// Base64-encoded PDF, optionally as a `data:` URL
    pub pdf: String,
    /// Original fully-qualified name -> new name
    pub mappings: RenameMapping,
}

#[derive(Serialize)]
pub struct RenameResponse {
    pub success: bool,
    pub renamed_count: usize,
    /// Base64-encoded rewritten PDF
    pub pdf: String,
    pub renamed: Vec<AppliedRename>,
    pub unmatched: Vec<String>,
    pub unchanged: Vec<String>,
}

/// Handler: POST /api/rename
pub async fn handle_rename(
    State(state): State<AppState>,
    payload: Result<Json<RenameRequest>, JsonRejection>,
) -> Result<Json<RenameResponse>, ApiError> {
    let Json(request) = payload?;
    let bytes = decode_pdf(&request.pdf)?;
    debug!(
        bytes = bytes.len(),
        mappings = request.mappings.len(),
        "rename request"
    );

    let options = state.options.clone();
    let mappings = request.mappings;
    let outcome =
        tokio::task::spawn_blocking(move || rename_document(&bytes, &mappings, &options))
            .await??;

    let report = outcome.report;
    info!(
        renamed = report.renamed_count,
        unmatched = report.unmatched.len(),
        "renamed PDF fields"
    );

    Ok(Json(RenameResponse {
        success: true,
        renamed_count: report.renamed_count,
        pdf: BASE64.encode(&outcome.pdf),
        renamed: report.renamed,
        unmatched: report.unmatched.into_iter().map(|m| m.name).collect(),
        unchanged: report.unchanged,
    }))
}

/// Decode a base64 PDF payload, accepting a `data:application/pdf;base64,`
/// prefix as browsers produce it.
fn decode_pdf(encoded: &str) -> Result<Vec<u8>, ApiError> {
    let encoded = encoded.trim();
    let encoded = match encoded.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| ApiError::InvalidRequest("Malformed data URL".to_string()))?,
        None => encoded,
    };

    if encoded.is_empty() {
        return Err(ApiError::InvalidRequest("No PDF data provided".to_string()));
    }

    BASE64
        .decode(encoded)
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid PDF base64: {}", e)))
}
