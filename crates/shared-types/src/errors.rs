//! # Error Types
//!
//! Error values raised by domain code and request plumbing that the HTTP
//! boundary knows how to map to a status code.

use serde_json::Value;
use thiserror::Error;

/// Application error with a stable, machine-readable code.
///
/// Two domain errors are equal when their codes are equal; the message is
/// free text and never takes part in the comparison.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct DomainError {
    /// Stable error code (e.g. `error.runtime.recordNotFound`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl DomainError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Sentinel comparison by code.
    #[must_use]
    pub fn equals(&self, other: &DomainError) -> bool {
        self.code == other.code
    }

    /// Whether this error is one of the known "record not found" sentinels.
    #[must_use]
    pub fn is_record_not_found(&self) -> bool {
        sentinels::RECORD_NOT_FOUND_CODES.contains(&self.code.as_str())
    }
}

impl PartialEq for DomainError {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl Eq for DomainError {}

/// Well-known domain error values used for equality checks.
pub mod sentinels {
    use super::DomainError;

    pub const RUNTIME_RECORD_NOT_FOUND: &str = "error.runtime.recordNotFound";
    pub const TRANSPORT_RECORD_NOT_FOUND: &str = "error.transport.recordNotFound";

    /// Every code that means "record not found".
    pub const RECORD_NOT_FOUND_CODES: [&str; 2] =
        [RUNTIME_RECORD_NOT_FOUND, TRANSPORT_RECORD_NOT_FOUND];

    /// Record not found, raised by the domain runtime.
    pub fn runtime_record_not_found() -> DomainError {
        DomainError::new(RUNTIME_RECORD_NOT_FOUND, "The requested record was not found.")
    }

    /// Record not found, raised by the transport layer for `record_type`/`id`.
    pub fn transport_record_not_found(record_type: &str, id: &str) -> DomainError {
        DomainError::new(
            TRANSPORT_RECORD_NOT_FOUND,
            format!("'{record_type}' not found. Make sure the ID exists and the record is not expired. ({id})"),
        )
    }
}

/// Lower-level request failure that carries its own HTTP status.
///
/// `status` is kept as a raw JSON value because it comes from trusted but
/// loosely typed callers; it is sanitized at the HTTP boundary.
#[derive(Debug, Clone, Error)]
#[error("{code} ({status}): {reason}")]
pub struct ProtocolError {
    /// Error code reported by the failing layer.
    pub code: String,
    /// Human-readable reason.
    pub reason: String,
    /// Raw status as reported, possibly non-numeric or out of range.
    pub status: Value,
    /// Context object for diagnostics (request path, upstream response...).
    pub context: Value,
}

impl ProtocolError {
    pub fn new(code: impl Into<String>, reason: impl Into<String>, status: impl Into<Value>) -> Self {
        Self {
            code: code.into(),
            reason: reason.into(),
            status: status.into(),
            context: Value::Null,
        }
    }

    /// Attach a diagnostic context object.
    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sentinels_are_record_not_found() {
        assert!(sentinels::runtime_record_not_found().is_record_not_found());
        assert!(sentinels::transport_record_not_found("Relationship", "REL123").is_record_not_found());
    }

    #[test]
    fn test_equality_ignores_message() {
        let a = DomainError::new(sentinels::RUNTIME_RECORD_NOT_FOUND, "first");
        let b = DomainError::new(sentinels::RUNTIME_RECORD_NOT_FOUND, "second");
        assert_eq!(a, b);
        assert!(a.equals(&sentinels::runtime_record_not_found()));
    }

    #[test]
    fn test_other_codes_are_not_sentinels() {
        let err = DomainError::new("error.runtime.validation.invalidPropertyValue", "bad value");
        assert!(!err.is_record_not_found());
        assert_eq!(
            err.to_string(),
            "error.runtime.validation.invalidPropertyValue: bad value"
        );
    }

    #[test]
    fn test_protocol_error_context() {
        let err = ProtocolError::new("error.platform.unavailable", "Platform unavailable", 503)
            .with_context(json!({ "path": "/api/v1/Challenges" }));
        assert_eq!(err.status, json!(503));
        assert_eq!(err.context["path"], "/api/v1/Challenges");
        assert_eq!(
            err.to_string(),
            "error.platform.unavailable (503): Platform unavailable"
        );
    }
}
