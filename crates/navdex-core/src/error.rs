//! Error types and error code constants for navdex.
//!
//! `IndexError` is the single error type surfaced by a run. Record-level
//! problems are reported by the parser as [`RecordError`] and wrapped here
//! with the unit and line they came from, so a diagnostic always names the
//! offending file and record.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid arguments or configuration
//! - `3`: Input errors (schema drift, malformed records, unreadable index,
//!   unknown query subject)
//! - `10`: Internal errors (bugs, unexpected state)
//!
//! Recoverable per-record conditions (a path missing from the file catalog,
//! a dangling target) are not errors; see [`crate::session::Diagnostic`].

use std::fmt;
use std::io;

use thiserror::Error;

use crate::record::RecordError;

/// Longest raw record text carried inside an error.
const MAX_RECORD_ECHO: usize = 160;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Stable error codes for JSON output and process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments or configuration from the caller.
    InvalidArguments = 2,
    /// The record stream or a stored index could not be understood.
    InputError = 3,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Fatal errors. Any of these aborts the whole run.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The producer emitted a record kind this indexer does not know.
    #[error("{unit}:{line}: unrecognized record kind '{kind}'")]
    UnrecognizedRecordKind {
        unit: String,
        line: usize,
        kind: String,
    },

    /// A record could not be decoded; the rest of the unit is unreadable.
    #[error("{unit}:{line}: malformed record ({reason}): {record}")]
    MalformedRecord {
        unit: String,
        line: usize,
        reason: String,
        record: String,
    },

    /// Configuration could not be loaded or is inconsistent.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A serialized index could not be loaded.
    #[error("cannot load index {path}: {reason}")]
    IndexLoad { path: String, reason: String },

    /// A query named an entity the index does not contain.
    #[error("no entity matches '{subject}'")]
    NotFound { subject: String },

    /// IO error while reading units or writing the index.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&IndexError> for OutputErrorCode {
    fn from(err: &IndexError) -> Self {
        match err {
            IndexError::UnrecognizedRecordKind { .. } => OutputErrorCode::InputError,
            IndexError::MalformedRecord { .. } => OutputErrorCode::InputError,
            IndexError::InvalidConfig { .. } => OutputErrorCode::InvalidArguments,
            IndexError::IndexLoad { .. } => OutputErrorCode::InputError,
            IndexError::NotFound { .. } => OutputErrorCode::InputError,
            IndexError::Io(_) => OutputErrorCode::InputError,
            IndexError::Json(_) => OutputErrorCode::InputError,
            IndexError::Internal { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<IndexError> for OutputErrorCode {
    fn from(err: IndexError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl IndexError {
    /// Wrap a record-level error with the unit and line it occurred on.
    pub fn from_record(unit: &str, line: usize, raw: &str, err: RecordError) -> Self {
        match err {
            RecordError::UnknownKind(kind) => IndexError::UnrecognizedRecordKind {
                unit: unit.to_string(),
                line,
                kind,
            },
            other => IndexError::MalformedRecord {
                unit: unit.to_string(),
                line,
                reason: other.to_string(),
                record: echo_record(raw),
            },
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        IndexError::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        IndexError::Internal {
            message: message.into(),
        }
    }

    /// Short stable name of the variant, used in JSON error output.
    pub fn kind_name(&self) -> &'static str {
        match self {
            IndexError::UnrecognizedRecordKind { .. } => "UnrecognizedRecordKind",
            IndexError::MalformedRecord { .. } => "MalformedRecord",
            IndexError::InvalidConfig { .. } => "InvalidConfig",
            IndexError::IndexLoad { .. } => "IndexLoad",
            IndexError::NotFound { .. } => "NotFound",
            IndexError::Io(_) => "Io",
            IndexError::Json(_) => "Json",
            IndexError::Internal { .. } => "InternalError",
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

fn echo_record(raw: &str) -> String {
    if raw.len() <= MAX_RECORD_ECHO {
        return raw.to_string();
    }
    let mut cut = MAX_RECORD_ECHO;
    while !raw.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &raw[..cut])
}

// ============================================================================
// Tests
// ============================================================================
