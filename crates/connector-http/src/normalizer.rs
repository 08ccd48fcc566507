//! # Error Normalizer
//!
//! Turns one [`Failure`] into one status and one [`ErrorEnvelope`].
//!
//! ## Precedence (first match wins)
//!
//! | Failure              | Status          | Code                                   |
//! |----------------------|-----------------|----------------------------------------|
//! | headers already sent | (delegated)     | -                                      |
//! | InvalidPayload       | 400             | `validation.invalidJsonInPayload`      |
//! | RouteNotFound        | 404             | `routeDoesNotExist`                    |
//! | MethodNotAllowed     | 405             | `http.methodNotAllowed`                |
//! | NotAcceptable        | 406             | `http.notAcceptable`                   |
//! | Domain               | 404 / 400       | domain code, verbatim                  |
//! | Protocol             | sanitized       | protocol code, verbatim                |
//! | Unexpected           | 500             | `unexpected`                           |
//! | normalizer failure   | 500             | `errorInErrorHandler`                  |
//!
//! Responses that fail without a [`Failure`] attached (extractor rejections
//! produced by the framework) are read back and rendered as protocol errors
//! with code `http.requestRejected`, so no non-2xx response leaves as plain
//! text.

use crate::envelope::{codes, messages, stacktrace_lines, ErrorEnvelope, NormalizedError};
use crate::failure::{Failure, PendingFailure, ResponseProgress};
use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use shared_types::ProtocolError;
use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error};

/// Most bytes read back from an unmarked failure response.
const REJECTION_BODY_LIMIT: usize = 16 * 1024;

/// Map a loosely typed status to a valid HTTP status.
///
/// Non-integers and values outside `[100, 599]` become 500.
pub fn sanitize_status(status: &Value) -> StatusCode {
    status
        .as_u64()
        .filter(|code| (100..=599).contains(code))
        .and_then(|code| u16::try_from(code).ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Build the normalized error for a failure. Pure apart from id generation.
pub fn normalize(failure: &Failure) -> NormalizedError {
    match failure {
        Failure::InvalidPayload => NormalizedError::for_prod(
            StatusCode::BAD_REQUEST,
            codes::INVALID_JSON_IN_PAYLOAD,
            messages::INVALID_JSON_IN_PAYLOAD,
        ),
        Failure::RouteNotFound => NormalizedError::for_prod(
            StatusCode::NOT_FOUND,
            codes::ROUTE_DOES_NOT_EXIST,
            messages::ROUTE_DOES_NOT_EXIST,
        ),
        Failure::MethodNotAllowed => NormalizedError::for_prod(
            StatusCode::METHOD_NOT_ALLOWED,
            codes::METHOD_NOT_ALLOWED,
            messages::METHOD_NOT_ALLOWED,
        ),
        Failure::NotAcceptable => NormalizedError::for_prod(
            StatusCode::NOT_ACCEPTABLE,
            codes::NOT_ACCEPTABLE,
            messages::NOT_ACCEPTABLE,
        ),
        Failure::Domain(domain) => {
            let status = if domain.is_record_not_found() {
                StatusCode::NOT_FOUND
            } else {
                StatusCode::BAD_REQUEST
            };
            NormalizedError::for_prod(status, domain.code.clone(), domain.message.clone())
        }
        Failure::Protocol { error, backtrace } => NormalizedError::for_dev(
            sanitize_status(&error.status),
            error.code.clone(),
            error.reason.clone(),
            stacktrace_lines(backtrace),
            error.to_string(),
        ),
        Failure::Unexpected(error) => {
            let message = error.to_string();
            let details = if message.is_empty() {
                format!("{error:?}")
            } else {
                message
            };
            NormalizedError::for_dev(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::UNEXPECTED,
                messages::UNEXPECTED,
                stacktrace_lines(error.backtrace()),
                details,
            )
        }
    }
}

/// The fixed envelope used when normalization itself failed.
pub fn error_in_error_handler(cause: &str) -> NormalizedError {
    NormalizedError::for_dev(
        StatusCode::INTERNAL_SERVER_ERROR,
        codes::ERROR_IN_ERROR_HANDLER,
        format!("The error handler ran into an error, caused by '{cause}', this should not happen"),
        stacktrace_lines(&Backtrace::capture()),
        messages::REPORT_TO_DEVELOPER,
    )
}

/// Render a failure as a complete JSON response. Never fails.
pub fn render(failure: &Failure) -> Response {
    render_with(failure, normalize)
}

/// [`render`] with the normalization step supplied by the caller.
///
/// A panic or a serialization error inside the step yields the fixed
/// `errorInErrorHandler` response.
pub fn render_with(
    failure: &Failure,
    normalize_step: impl FnOnce(&Failure) -> NormalizedError,
) -> Response {
    let rendered = catch_unwind(AssertUnwindSafe(|| {
        let normalized = normalize_step(failure);
        log_failure(failure, &normalized);
        serde_json::to_vec(&ErrorEnvelope::new(normalized.clone()))
            .map(|body| (normalized.status(), body))
    }));

    let cause = match rendered {
        Ok(Ok((status, body))) => return json_response(status, body),
        Ok(Err(serialization)) => serialization.to_string(),
        Err(panic) => panic_message(panic.as_ref()),
    };

    let fallback = error_in_error_handler(&cause);
    error!(
        severity = "fatal",
        error_id = %fallback.id,
        cause = %cause,
        "Error normalization failed"
    );

    let body = json!({
        "error": {
            "id": fallback.id,
            "code": fallback.code,
            "message": fallback.message,
            "stacktrace": fallback.stacktrace,
            "details": fallback.details,
        }
    });
    json_response(StatusCode::INTERNAL_SERVER_ERROR, body.to_string().into_bytes())
}

/// Normalize a response coming back from the router.
///
/// Responses carrying a [`PendingFailure`] are rendered, bare `405`s from
/// the method router become `MethodNotAllowed`, other 4xx/5xx responses
/// without a JSON body become protocol errors. Everything else passes
/// through untouched.
pub async fn normalize_response(mut response: Response) -> Response {
    if let Some(pending) = response.extensions_mut().remove::<PendingFailure>() {
        if pending.progress == ResponseProgress::HeadersSent {
            debug!(
                failure = pending.failure.kind(),
                "Headers already sent, delegating to the transport"
            );
            return response;
        }
        return render(&pending.failure);
    }

    if response.status() == StatusCode::METHOD_NOT_ALLOWED
        && !response.headers().contains_key(header::CONTENT_TYPE)
    {
        let allow = response.headers().get(header::ALLOW).cloned();
        let mut normalized = render(&Failure::MethodNotAllowed);
        if let Some(allow) = allow {
            normalized.headers_mut().insert(header::ALLOW, allow);
        }
        return normalized;
    }

    if is_unmarked_failure(&response) {
        return render(&rejection_failure(response).await);
    }

    response
}

fn is_unmarked_failure(response: &Response) -> bool {
    let status = response.status();
    (status.is_client_error() || status.is_server_error()) && !is_json(response.headers())
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .is_some_and(|mime| mime == "application/json" || mime.ends_with("+json"))
}

/// Classify a framework rejection by its status, keeping its text as reason.
async fn rejection_failure(response: Response) -> Failure {
    let status = response.status();
    let reason = match to_bytes(response.into_body(), REJECTION_BODY_LIMIT).await {
        Ok(bytes) if !bytes.is_empty() => String::from_utf8_lossy(&bytes).into_owned(),
        _ => status.canonical_reason().unwrap_or("Request failed").to_string(),
    };
    Failure::protocol(ProtocolError::new(
        codes::REQUEST_REJECTED,
        reason,
        status.as_u16(),
    ))
}

fn log_failure(failure: &Failure, normalized: &NormalizedError) {
    match failure {
        Failure::InvalidPayload
        | Failure::RouteNotFound
        | Failure::MethodNotAllowed
        | Failure::NotAcceptable => {
            debug!(failure = failure.kind(), code = %normalized.code, "Handling request failure");
        }
        Failure::Domain(_) => {
            error!(
                error_id = %normalized.id,
                code = %normalized.code,
                status = normalized.status_code,
                "Request failed with domain error: {}",
                failure
            );
        }
        Failure::Protocol { error, .. } => {
            error!(
                error_id = %normalized.id,
                code = %normalized.code,
                status = normalized.status_code,
                context = %error.context,
                "Request failed with protocol error: {}",
                failure
            );
        }
        Failure::Unexpected(inner) => {
            error!(
                error_id = %normalized.id,
                "Unexpected request failure: {:?}",
                inner
            );
        }
    }
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::NO_STACKTRACE;
    use crate::failure::HttpFailure;
    use axum::response::IntoResponse;
    use proptest::prelude::*;
    use shared_types::{sentinels, DomainError, ProtocolError};

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_sanitize_status_passes_valid_codes() {
        assert_eq!(sanitize_status(&json!(100)), StatusCode::CONTINUE);
        assert_eq!(sanitize_status(&json!(418)), StatusCode::IM_A_TEAPOT);
        assert_eq!(sanitize_status(&json!(599)).as_u16(), 599);
    }

    #[test]
    fn test_sanitize_status_rejects_invalid_codes() {
        for raw in [json!(99), json!(600), json!(-1), json!(404.5), json!("404"), Value::Null] {
            assert_eq!(sanitize_status(&raw), StatusCode::INTERNAL_SERVER_ERROR, "{raw}");
        }
    }

    proptest! {
        #[test]
        fn prop_sanitize_status_is_idempotent(raw in any::<i64>()) {
            let once = sanitize_status(&json!(raw));
            let twice = sanitize_status(&json!(once.as_u16()));
            prop_assert_eq!(once, twice);
            prop_assert!((100..=599).contains(&once.as_u16()));
        }
    }

    #[test]
    fn test_fixed_failures() {
        let cases = [
            (Failure::InvalidPayload, 400, codes::INVALID_JSON_IN_PAYLOAD),
            (Failure::RouteNotFound, 404, codes::ROUTE_DOES_NOT_EXIST),
            (Failure::MethodNotAllowed, 405, codes::METHOD_NOT_ALLOWED),
            (Failure::NotAcceptable, 406, codes::NOT_ACCEPTABLE),
        ];
        for (failure, status, code) in cases {
            let normalized = normalize(&failure);
            assert_eq!(normalized.status_code, status);
            assert_eq!(normalized.code, code);
            assert!(normalized.stacktrace.is_none());
        }
    }

    #[test]
    fn test_domain_errors() {
        let not_found = normalize(&Failure::Domain(sentinels::transport_record_not_found(
            "RelationshipTemplate",
            "RLT123",
        )));
        assert_eq!(not_found.status_code, 404);
        assert_eq!(not_found.code, "error.transport.recordNotFound");

        let invalid = normalize(&Failure::Domain(DomainError::new(
            "error.runtime.validation.invalidPropertyValue",
            "expiresAt must be in the future",
        )));
        assert_eq!(invalid.status_code, 400);
        assert_eq!(invalid.code, "error.runtime.validation.invalidPropertyValue");
        assert_eq!(invalid.message, "expiresAt must be in the future");
    }

    #[test]
    fn test_protocol_error_status_is_sanitized() {
        let normalized = normalize(&Failure::protocol(ProtocolError::new(
            "error.platform.unexpected",
            "Upstream failed",
            "not a number",
        )));
        assert_eq!(normalized.status_code, 500);
        assert_eq!(normalized.code, "error.platform.unexpected");
        assert_eq!(normalized.message, "Upstream failed");
        assert!(normalized.stacktrace.is_some());
        assert!(normalized.details.is_some());

        let normalized = normalize(&Failure::protocol(ProtocolError::new(
            "error.platform.forbidden",
            "Forbidden",
            403,
        )));
        assert_eq!(normalized.status_code, 403);
    }

    #[test]
    fn test_unexpected_error() {
        let normalized = normalize(&Failure::Unexpected(anyhow::anyhow!("disk full")));
        assert_eq!(normalized.status_code, 500);
        assert_eq!(normalized.code, codes::UNEXPECTED);
        assert_eq!(normalized.message, messages::UNEXPECTED);
        assert_eq!(normalized.details.as_deref(), Some("disk full"));
        assert!(!normalized.stacktrace.unwrap().is_empty());
    }

    #[test]
    fn test_error_in_error_handler() {
        let normalized = error_in_error_handler("boom");
        assert_eq!(normalized.code, codes::ERROR_IN_ERROR_HANDLER);
        assert_eq!(
            normalized.message,
            "The error handler ran into an error, caused by 'boom', this should not happen"
        );
        assert_eq!(normalized.details.as_deref(), Some(messages::REPORT_TO_DEVELOPER));
        assert!(normalized.stacktrace.is_some());
    }

    #[tokio::test]
    async fn test_render_produces_json_envelope() {
        let response = render(&Failure::RouteNotFound);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "error.connector.routeDoesNotExist");
        assert_eq!(body["error"]["message"], "This route does not exist.");
    }

    #[tokio::test]
    async fn test_normalize_response_renders_marker() {
        let response = normalize_response(HttpFailure::invalid_payload().into_response()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.extensions().get::<PendingFailure>().is_none());
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], codes::INVALID_JSON_IN_PAYLOAD);
    }

    #[tokio::test]
    async fn test_headers_sent_is_delegated() {
        let response =
            normalize_response(HttpFailure::invalid_payload().after_headers_sent().into_response())
                .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_bare_405_is_normalized_and_keeps_allow() {
        let mut bare = StatusCode::METHOD_NOT_ALLOWED.into_response();
        bare.headers_mut()
            .insert(header::ALLOW, HeaderValue::from_static("GET,HEAD"));

        let response = normalize_response(bare).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(header::ALLOW).unwrap(), "GET,HEAD");
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], codes::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_successful_response_untouched() {
        let response = normalize_response((StatusCode::CREATED, "ok").into_response()).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = normalize_response(StatusCode::MOVED_PERMANENTLY.into_response()).await;
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    }

    #[tokio::test]
    async fn test_plain_text_rejection_gets_envelope() {
        let rejection = (StatusCode::BAD_REQUEST, "Invalid URL: Cannot parse `abc`").into_response();

        let response = normalize_response(rejection).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], codes::REQUEST_REJECTED);
        assert_eq!(body["error"]["message"], "Invalid URL: Cannot parse `abc`");
    }

    #[tokio::test]
    async fn test_empty_rejection_uses_reason_phrase() {
        let response = normalize_response(StatusCode::UNAUTHORIZED.into_response()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_json_failure_body_is_left_alone() {
        let degraded = (
            StatusCode::SERVICE_UNAVAILABLE,
            axum::Json(json!({ "status": "degraded" })),
        )
            .into_response();
        let response = normalize_response(degraded).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await, json!({ "status": "degraded" }));
    }

    #[tokio::test]
    async fn test_failing_normalization_falls_back() {
        let response = render_with(&Failure::RouteNotFound, |_: &Failure| -> NormalizedError {
            panic!("normalizer exploded")
        });
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], codes::ERROR_IN_ERROR_HANDLER);
        assert_eq!(
            body["error"]["message"],
            "The error handler ran into an error, caused by 'normalizer exploded', this should not happen"
        );
        assert_eq!(body["error"]["details"], messages::REPORT_TO_DEVELOPER);
        assert!(body["error"]["stacktrace"].is_array());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static text");
        assert_eq!(panic_message(payload.as_ref()), "static text");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned text"));
        assert_eq!(panic_message(payload.as_ref()), "owned text");
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }

    #[test]
    fn test_placeholder_without_backtrace() {
        let failure = Failure::Protocol {
            error: ProtocolError::new("error.x", "y", 400),
            backtrace: Backtrace::disabled(),
        };
        assert_eq!(
            normalize(&failure).stacktrace,
            Some(vec![NO_STACKTRACE.to_string()])
        );
    }
}
