//! # Error Envelope
//!
//! Body of every non-2xx response produced by the host:
//!
//! ```json
//! { "error": { "id": "...", "code": "...", "message": "...", "stacktrace": [...], "details": "..." } }
//! ```

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::backtrace::{Backtrace, BacktraceStatus};
use uuid::Uuid;

/// Wire codes owned by the host itself.
pub mod codes {
    pub const INVALID_JSON_IN_PAYLOAD: &str = "error.connector.validation.invalidJsonInPayload";
    pub const INVALID_PROPERTY_VALUE: &str = "error.connector.validation.invalidPropertyValue";
    pub const ROUTE_DOES_NOT_EXIST: &str = "error.connector.routeDoesNotExist";
    pub const METHOD_NOT_ALLOWED: &str = "error.connector.http.methodNotAllowed";
    pub const NOT_ACCEPTABLE: &str = "error.connector.http.notAcceptable";
    pub const UNSUPPORTED_MEDIA_TYPE: &str = "error.connector.http.unsupportedMediaType";
    pub const REQUEST_TIMEOUT: &str = "error.connector.http.requestTimeout";
    pub const REQUEST_REJECTED: &str = "error.connector.http.requestRejected";
    pub const INVALID_REQUEST_BODY: &str = "error.connector.http.invalidRequestBody";
    pub const UNEXPECTED: &str = "error.connector.unexpected";
    pub const ERROR_IN_ERROR_HANDLER: &str = "error.connector.errorInErrorHandler";
}

/// Fixed user-facing messages.
pub mod messages {
    pub const INVALID_JSON_IN_PAYLOAD: &str = "The given payload is not a valid json object.";
    pub const ROUTE_DOES_NOT_EXIST: &str = "This route does not exist.";
    pub const METHOD_NOT_ALLOWED: &str =
        "The request method is not supported for the requested resource.";
    pub const NOT_ACCEPTABLE: &str = "The requested resource is capable of generating only content not acceptable according to the Accept headers sent in the request.";
    pub const UNEXPECTED: &str = "An unexpected error occurred.";
    pub const REPORT_TO_DEVELOPER: &str = "Report this to a connector developer";
}

/// Stack trace placeholder when none was captured.
pub const NO_STACKTRACE: &str = "<There is no stacktrace>";

/// One failed request, ready to serialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedError {
    pub id: String,
    pub code: String,
    pub message: String,
    /// Carried by the HTTP status line, not repeated in the body.
    #[serde(skip)]
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl NormalizedError {
    /// Client-facing variant: code and message only.
    pub fn for_prod(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: new_error_id(),
            code: code.into(),
            message: message.into(),
            status_code: status.as_u16(),
            stacktrace: None,
            details: None,
        }
    }

    /// Developer variant with stack trace and details.
    pub fn for_dev(
        status: StatusCode,
        code: impl Into<String>,
        message: impl Into<String>,
        stacktrace: Vec<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            stacktrace: Some(stacktrace),
            details: Some(details.into()),
            ..Self::for_prod(status, code, message)
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// `{"error": NormalizedError}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: NormalizedError,
}

impl ErrorEnvelope {
    pub fn new(error: NormalizedError) -> Self {
        Self { error }
    }
}

/// Time-ordered error id, so ids in logs sort by occurrence.
pub fn new_error_id() -> String {
    Uuid::now_v7().to_string()
}

/// Lines of a captured backtrace, or the placeholder.
pub fn stacktrace_lines(backtrace: &Backtrace) -> Vec<String> {
    match backtrace.status() {
        BacktraceStatus::Captured => backtrace.to_string().lines().map(str::to_owned).collect(),
        _ => vec![NO_STACKTRACE.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prod_variant_omits_diagnostics() {
        let error = NormalizedError::for_prod(
            StatusCode::NOT_FOUND,
            codes::ROUTE_DOES_NOT_EXIST,
            messages::ROUTE_DOES_NOT_EXIST,
        );
        let body = serde_json::to_value(ErrorEnvelope::new(error.clone())).unwrap();

        assert_eq!(body["error"]["code"], "error.connector.routeDoesNotExist");
        assert_eq!(body["error"]["message"], "This route does not exist.");
        assert_eq!(body["error"]["id"], json!(error.id));
        assert!(body["error"].get("stacktrace").is_none());
        assert!(body["error"].get("details").is_none());
        assert!(body["error"].get("status_code").is_none());
    }

    #[test]
    fn test_dev_variant_carries_diagnostics() {
        let error = NormalizedError::for_dev(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::UNEXPECTED,
            messages::UNEXPECTED,
            vec![NO_STACKTRACE.to_string()],
            "boom",
        );
        let body = serde_json::to_value(ErrorEnvelope::new(error)).unwrap();

        assert_eq!(body["error"]["stacktrace"], json!(["<There is no stacktrace>"]));
        assert_eq!(body["error"]["details"], "boom");
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(new_error_id(), new_error_id());
    }

    #[test]
    fn test_disabled_backtrace_uses_placeholder() {
        assert_eq!(
            stacktrace_lines(&Backtrace::disabled()),
            vec![NO_STACKTRACE.to_string()]
        );
    }
}
