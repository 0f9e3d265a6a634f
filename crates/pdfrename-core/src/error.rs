use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PdfRenameError {
    #[error("Malformed PDF document: {0}")]
    MalformedDocument(String),

    #[error("No interactive form: {0}")]
    NoForm(String),

    #[error("Renaming would give '{first}' and '{second}' the same name '{name}'")]
    NameCollision {
        name: String,
        first: String,
        second: String,
    },

    #[error("Invalid field name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Unsupported PDF feature: {0}")]
    Unsupported(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PdfRenameError {
    /// Stable machine-readable code for transport layers.
    pub fn code(&self) -> &'static str {
        match self {
            PdfRenameError::MalformedDocument(_) => "MALFORMED_DOCUMENT",
            PdfRenameError::NoForm(_) => "NO_FORM",
            PdfRenameError::NameCollision { .. } => "NAME_COLLISION",
            PdfRenameError::InvalidName { .. } => "INVALID_NAME",
            PdfRenameError::Unsupported(_) => "UNSUPPORTED",
            PdfRenameError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// A mapping entry whose original name matched no terminal field.
///
/// Not fatal: accumulated in [`crate::RenameReport::unmatched`].
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("No terminal field named '{name}'")]
pub struct FieldNotFound {
    pub name: String,
}
