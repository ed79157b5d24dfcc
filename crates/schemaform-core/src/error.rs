use crate::validate::ValidationReport;
use thiserror::Error;

/// Errors raised by form session operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormError {
    #[error("no field is declared at path '{0}'")]
    UnknownField(String),

    #[error("field '{path}' is a {kind} field and does not accept {operation}")]
    WrongKind {
        path: String,
        kind: &'static str,
        operation: &'static str,
    },

    #[error("index {index} is out of range for '{path}' (length {len})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("upload task {0} does not exist")]
    UnknownUpload(u64),
}

/// Failures of one upload task. All of them are retryable by selecting the
/// file again.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("signing request failed: {0}")]
    Signing(String),

    #[error("upload rejected with status {status}")]
    Rejected { status: u16 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("selected file is empty")]
    EmptyFile,
}

/// Why a submission was refused.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SubmitError {
    #[error("{pending} upload(s) still in flight")]
    UploadsPending { pending: usize },

    #[error("{} field(s) failed validation", .0.errors.len())]
    Invalid(ValidationReport),
}

/// Problems loading a schema document.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read schema: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid schema JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("path '{0}' is declared by more than one field")]
    DuplicatePath(String),

    #[error("field '{0}' has an empty path")]
    EmptyPath(String),
}
