//! Error normalization middleware.
//!
//! Sits between the router and the transport. Every response passes
//! through [`normalize_response`]; a panicking handler is caught here and
//! rendered as an unexpected failure.

use crate::failure::Failure;
use crate::normalizer::{normalize_response, panic_message, render};
use axum::{body::Body, http::Request, response::Response};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Normalization layer
#[derive(Clone, Default)]
pub struct ErrorNormalizationLayer;

impl ErrorNormalizationLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for ErrorNormalizationLayer {
    type Service = ErrorNormalizationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ErrorNormalizationService { inner }
    }
}

/// Normalization service
#[derive(Clone)]
pub struct ErrorNormalizationService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for ErrorNormalizationService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match AssertUnwindSafe(inner.call(req)).catch_unwind().await {
                Ok(Ok(response)) => Ok(normalize_response(response).await),
                Ok(Err(err)) => Err(err),
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    Ok(render(&Failure::Unexpected(anyhow::anyhow!(
                        "request handler panicked: {message}"
                    ))))
                }
            }
        })
    }
}
