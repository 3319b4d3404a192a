//! JSON output types for CLI responses.
//!
//! Every response is a single JSON document on stdout:
//!
//! 1. **Status first:** `status` is `"ok"` or `"error"`.
//! 2. **Versioned:** `schema_version` lets consumers detect format changes.
//! 3. **Deterministic:** results are sorted before they are emitted.

use std::io::{self, Write};

use serde::Serialize;

use crate::error::{IndexError, OutputErrorCode};
use crate::pipeline::IndexReport;

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

// ============================================================================
// Error Types
// ============================================================================

/// Error information for error responses.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    /// Numeric error code, also the process exit status.
    pub code: u8,
    /// Variant name, e.g. `MalformedRecord`.
    pub kind: String,
    pub message: String,
    /// Error-specific structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    pub fn from_error(err: &IndexError) -> Self {
        let details = match err {
            IndexError::UnrecognizedRecordKind { unit, line, kind } => Some(serde_json::json!({
                "unit": unit,
                "line": line,
                "record_kind": kind,
            })),
            IndexError::MalformedRecord {
                unit,
                line,
                reason,
                record,
            } => Some(serde_json::json!({
                "unit": unit,
                "line": line,
                "reason": reason,
                "record": record,
            })),
            IndexError::IndexLoad { path, .. } => Some(serde_json::json!({ "path": path })),
            IndexError::NotFound { subject } => Some(serde_json::json!({ "subject": subject })),
            _ => None,
        };
        ErrorInfo {
            code: OutputErrorCode::from(err).code(),
            kind: err.kind_name().to_string(),
            message: err.to_string(),
            details,
        }
    }
}

/// Response for any failed command.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Status: "error".
    pub status: String,
    pub schema_version: String,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn from_error(err: &IndexError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

// ============================================================================
// Response Structs
// ============================================================================

/// Response for `navdex index`.
#[derive(Debug, Clone, Serialize)]
pub struct IndexResponse {
    /// Status: "ok".
    pub status: String,
    pub schema_version: String,
    /// Where the index was written.
    pub output: String,
    pub report: IndexReport,
}

impl IndexResponse {
    pub fn new(output: impl Into<String>, report: IndexReport) -> Self {
        IndexResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            output: output.into(),
            report,
        }
    }
}

/// Response for `navdex query`.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse<T: Serialize> {
    /// Status: "ok".
    pub status: String,
    pub schema_version: String,
    /// Query name, e.g. `references`.
    pub query: String,
    pub count: usize,
    pub results: Vec<T>,
}

impl<T: Serialize> QueryResponse<T> {
    pub fn new(query: impl Into<String>, results: Vec<T>) -> Self {
        QueryResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            query: query.into(),
            count: results.len(),
            results,
        }
    }
}

// ============================================================================
// Emit
// ============================================================================

/// Emit a response as pretty-printed JSON to a writer.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

/// Emit a response as compact JSON (single line) to a writer.
pub fn emit_response_compact<T: Serialize>(
    response: &T,
    writer: &mut impl Write,
) -> io::Result<()> {
    let json = serde_json::to_string(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordError;

    mod error_response_tests {
        use super::*;

        #[test]
        fn malformed_record_carries_position() {
            let err = IndexError::from_record(
                "foo.csv",
                4,
                "function,id",
                RecordError::DanglingAttribute("id".to_string()),
            );
            let json = serde_json::to_value(ErrorResponse::from_error(&err)).unwrap();
            assert_eq!(json["status"], "error");
            assert_eq!(json["schema_version"], SCHEMA_VERSION);
            assert_eq!(json["error"]["code"], 3);
            assert_eq!(json["error"]["kind"], "MalformedRecord");
            assert_eq!(json["error"]["details"]["unit"], "foo.csv");
            assert_eq!(json["error"]["details"]["line"], 4);
        }

        #[test]
        fn config_error_has_no_details() {
            let err = IndexError::invalid_config("batch_size must be positive");
            let json = serde_json::to_value(ErrorResponse::from_error(&err)).unwrap();
            assert_eq!(json["error"]["code"], 2);
            assert!(json["error"].get("details").is_none());
        }
    }

    mod emit_tests {
        use super::*;

        #[test]
        fn emit_response_produces_valid_json() {
            let response = QueryResponse::new("callers", vec![1u32, 2]);
            let mut buf = Vec::new();
            emit_response(&response, &mut buf).unwrap();
            let parsed: serde_json::Value = serde_json::from_slice(&buf).unwrap();
            assert_eq!(parsed["status"], "ok");
            assert_eq!(parsed["count"], 2);
        }

        #[test]
        fn compact_output_is_one_line() {
            let response = QueryResponse::<u32>::new("impls", Vec::new());
            let mut buf = Vec::new();
            emit_response_compact(&response, &mut buf).unwrap();
            let text = String::from_utf8(buf).unwrap();
            assert_eq!(text.lines().count(), 1);
            assert!(text.starts_with("{\"status\":\"ok\""));
        }
    }
}
