//! Error types for the pdfrename API

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pdfrename_core::PdfRenameError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error(transparent)]
    Pdf(#[from] PdfRenameError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    details: String,
    code: String,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, &'static str) {
        match self {
            ApiError::InvalidRequest(_) => (
                StatusCode::BAD_REQUEST,
                "INVALID_REQUEST",
                "Invalid request",
            ),
            ApiError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                "Request body too large",
            ),
            ApiError::Pdf(err) => {
                let (status, summary) = match err {
                    PdfRenameError::MalformedDocument(_) => {
                        (StatusCode::BAD_REQUEST, "Failed to read PDF")
                    }
                    PdfRenameError::NoForm(_) => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "PDF has no form fields")
                    }
                    PdfRenameError::NameCollision { .. } => {
                        (StatusCode::CONFLICT, "Field names would collide")
                    }
                    PdfRenameError::InvalidName { .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "Invalid field name")
                    }
                    PdfRenameError::Unsupported(_) => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "Unsupported PDF")
                    }
                    PdfRenameError::Serialization(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to write PDF")
                    }
                };
                (status, err.code(), summary)
            }
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal error",
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, summary) = self.parts();

        let details = match &self {
            ApiError::InvalidRequest(msg) => msg.clone(),
            ApiError::PayloadTooLarge => self.to_string(),
            ApiError::Pdf(err) => err.to_string(),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal error".to_string()
            }
        };

        let body = ErrorResponse {
            error: summary.to_string(),
            details,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::InvalidRequest(rejection.body_text())
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("PDF task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::Pdf(PdfRenameError::MalformedDocument("x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Pdf(PdfRenameError::NoForm("x".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::Pdf(PdfRenameError::NameCollision {
                    name: "b".into(),
                    first: "a".into(),
                    second: "b".into(),
                }),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Pdf(PdfRenameError::InvalidName {
                    name: "".into(),
                    reason: "empty".into(),
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::Pdf(PdfRenameError::Unsupported("x".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::InvalidRequest("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::PayloadTooLarge, StatusCode::PAYLOAD_TOO_LARGE),
            (
                ApiError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
