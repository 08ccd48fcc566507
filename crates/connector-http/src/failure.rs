//! # Request Failures
//!
//! Every way a request can fail, classified once into [`Failure`].
//!
//! Handlers return `Result<_, HttpFailure>`. The failure travels to the
//! normalization layer as a response extension and is turned into an
//! [`ErrorEnvelope`](crate::envelope::ErrorEnvelope) there, so the envelope
//! is built exactly once per request.

use crate::envelope::codes;
use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use shared_types::{DomainError, ProtocolError};
use std::backtrace::Backtrace;
use std::fmt;
use std::sync::Arc;

/// Tagged classification of a request failure.
#[derive(Debug)]
pub enum Failure {
    /// Request body is not valid JSON.
    InvalidPayload,
    /// No route matches the path.
    RouteNotFound,
    /// The path exists but not for this method.
    MethodNotAllowed,
    /// No acceptable representation for the `Accept` header.
    NotAcceptable,
    /// Application error with a stable code.
    Domain(DomainError),
    /// Lower-level failure carrying its own status.
    Protocol {
        error: ProtocolError,
        backtrace: Backtrace,
    },
    /// Anything else.
    Unexpected(anyhow::Error),
}

impl Failure {
    pub fn protocol(error: ProtocolError) -> Self {
        Self::Protocol {
            error,
            backtrace: Backtrace::capture(),
        }
    }

    /// Classify an arbitrary error by looking at what it wraps.
    pub fn classify(error: anyhow::Error) -> Self {
        if let Some(domain) = error.downcast_ref::<DomainError>() {
            return Self::Domain(domain.clone());
        }
        if let Some(protocol) = error.downcast_ref::<ProtocolError>() {
            return Self::protocol(protocol.clone());
        }
        if let Some(json) = error.downcast_ref::<serde_json::Error>() {
            if json.is_syntax() || json.is_eof() {
                return Self::InvalidPayload;
            }
        }
        Self::Unexpected(error)
    }

    /// Short label used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPayload => "InvalidPayload",
            Self::RouteNotFound => "RouteNotFound",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::NotAcceptable => "NotAcceptable",
            Self::Domain(_) => "DomainError",
            Self::Protocol { .. } => "ProtocolError",
            Self::Unexpected(_) => "Unexpected",
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(error) => write!(f, "{error}"),
            Self::Protocol { error, .. } => write!(f, "{error}"),
            Self::Unexpected(error) => write!(f, "{error}"),
            other => f.write_str(other.kind()),
        }
    }
}

/// How far the response had progressed when the failure happened.
///
/// Route handlers built on axum never reach [`HeadersSent`](Self::HeadersSent):
/// the head is written by the transport after the normalization layer has
/// run. The state exists for handlers that commit the head through another
/// channel (an upgraded connection, a proxied stream) and then fail. The
/// normalization layer leaves such responses as they are and the transport
/// decides what reaches the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseProgress {
    /// Nothing sent yet; the failure can be normalized.
    #[default]
    Pending,
    /// Status and headers are already out; the failure must not be
    /// rendered again.
    HeadersSent,
}

/// Response extension carrying a failure to the normalization layer.
#[derive(Debug, Clone)]
pub struct PendingFailure {
    pub failure: Arc<Failure>,
    pub progress: ResponseProgress,
}

/// Error type returned by route handlers.
#[derive(Debug)]
pub struct HttpFailure {
    failure: Failure,
    progress: ResponseProgress,
}

impl HttpFailure {
    pub fn new(failure: Failure) -> Self {
        Self {
            failure,
            progress: ResponseProgress::Pending,
        }
    }

    pub fn route_not_found() -> Self {
        Self::new(Failure::RouteNotFound)
    }

    pub fn method_not_allowed() -> Self {
        Self::new(Failure::MethodNotAllowed)
    }

    pub fn not_acceptable() -> Self {
        Self::new(Failure::NotAcceptable)
    }

    pub fn invalid_payload() -> Self {
        Self::new(Failure::InvalidPayload)
    }

    /// Mark the failure as raised after the response head was sent.
    ///
    /// The resulting response is passed through unrendered, see
    /// [`ResponseProgress::HeadersSent`].
    #[must_use]
    pub fn after_headers_sent(mut self) -> Self {
        self.progress = ResponseProgress::HeadersSent;
        self
    }

    pub fn failure(&self) -> &Failure {
        &self.failure
    }

    pub fn progress(&self) -> ResponseProgress {
        self.progress
    }
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.failure.fmt(f)
    }
}

impl IntoResponse for HttpFailure {
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response.extensions_mut().insert(PendingFailure {
            failure: Arc::new(self.failure),
            progress: self.progress,
        });
        response
    }
}

impl From<Failure> for HttpFailure {
    fn from(failure: Failure) -> Self {
        Self::new(failure)
    }
}

impl From<DomainError> for HttpFailure {
    fn from(error: DomainError) -> Self {
        Self::new(Failure::Domain(error))
    }
}

impl From<ProtocolError> for HttpFailure {
    fn from(error: ProtocolError) -> Self {
        Self::new(Failure::protocol(error))
    }
}

impl From<anyhow::Error> for HttpFailure {
    fn from(error: anyhow::Error) -> Self {
        Self::new(Failure::classify(error))
    }
}

impl From<JsonRejection> for HttpFailure {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonSyntaxError(_) => Self::invalid_payload(),
            JsonRejection::JsonDataError(err) => ProtocolError::new(
                codes::INVALID_PROPERTY_VALUE,
                err.body_text(),
                StatusCode::BAD_REQUEST.as_u16(),
            )
            .into(),
            JsonRejection::MissingJsonContentType(err) => ProtocolError::new(
                codes::UNSUPPORTED_MEDIA_TYPE,
                err.body_text(),
                StatusCode::UNSUPPORTED_MEDIA_TYPE.as_u16(),
            )
            .into(),
            other => ProtocolError::new(
                codes::INVALID_REQUEST_BODY,
                other.body_text(),
                other.status().as_u16(),
            )
            .into(),
        }
    }
}

/// JSON extractor and response whose rejections go through [`HttpFailure`].
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(HttpFailure))]
pub struct JsonBody<T>(pub T);

impl<T: Serialize> IntoResponse for JsonBody<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Fail with [`Failure::NotAcceptable`] unless the client accepts JSON.
///
/// A missing `Accept` header accepts everything.
pub fn ensure_accepts_json(headers: &HeaderMap) -> Result<(), HttpFailure> {
    let Some(accept) = headers.get(header::ACCEPT) else {
        return Ok(());
    };
    let Ok(accept) = accept.to_str() else {
        return Err(HttpFailure::not_acceptable());
    };

    let acceptable = accept
        .split(',')
        .filter_map(|range| range.split(';').next())
        .map(str::trim)
        .any(|range| matches!(range, "*/*" | "application/*" | "application/json"));

    if acceptable {
        Ok(())
    } else {
        Err(HttpFailure::not_acceptable())
    }
}
