//! Timeout middleware.
//!
//! Bounds every request. An elapsed request fails with a `408` protocol
//! error that the normalization layer renders like any other failure.

use crate::envelope::codes;
use crate::failure::HttpFailure;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;
use shared_types::ProtocolError;
use std::time::Duration;
use tokio::time::timeout;
use tower::{Layer, Service};
use tracing::warn;

/// Timeout layer
#[derive(Clone)]
pub struct TimeoutLayer {
    duration: Duration,
}

impl TimeoutLayer {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService {
            inner,
            duration: self.duration,
        }
    }
}

/// Timeout service
#[derive(Clone)]
pub struct TimeoutService<S> {
    inner: S,
    duration: Duration,
}

impl<S> Service<Request<Body>> for TimeoutService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let duration = self.duration;
        let path = req.uri().path().to_string();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match timeout(duration, inner.call(req)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout_ms = duration.as_millis() as u64, path = %path, "Request timed out");
                    Ok(timeout_failure(duration, &path).into_response())
                }
            }
        })
    }
}

fn timeout_failure(duration: Duration, path: &str) -> HttpFailure {
    ProtocolError::new(
        codes::REQUEST_TIMEOUT,
        format!("Request exceeded {}s timeout", duration.as_secs()),
        StatusCode::REQUEST_TIMEOUT.as_u16(),
    )
    .with_context(json!({ "path": path }))
    .into()
}
