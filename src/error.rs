use thiserror::Error;

/// Domain failures surfaced to IPC callers. Each variant maps to one wire
/// error code; database errors are wrapped rather than stringified at the
/// call site so `?` works throughout the structure layer.
#[derive(Debug, Error)]
pub enum StructureError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Format(String),
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

impl StructureError {
    pub fn validation(msg: impl Into<String>) -> Self {
        StructureError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        StructureError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        StructureError::Conflict(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        StructureError::Format(msg.into())
    }

    /// Wire error code for the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            StructureError::Validation(_) => "validation_error",
            StructureError::NotFound(_) => "not_found",
            StructureError::Conflict(_) => "conflict",
            StructureError::Format(_) => "format_error",
            StructureError::Db(_) => "internal_error",
        }
    }
}
