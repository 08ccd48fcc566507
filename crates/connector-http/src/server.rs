//! # HTTP Server Infrastructure
//!
//! Modules contribute routes during their `init`; the router is assembled
//! and served on `start`, and drained gracefully on `stop`.

use crate::config::HttpServerConfig;
use crate::failure::HttpFailure;
use crate::middleware::{create_cors_layer, ErrorNormalizationLayer, TimeoutLayer, TracingLayer};
use async_trait::async_trait;
use axum::handler::Handler;
use axum::http::Method;
use axum::routing::{on, MethodFilter};
use axum::Router;
use module_registry::{Infrastructure, InfrastructureContext, ModuleError};
use parking_lot::Mutex;
use shared_types::ModuleDescriptor;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Registry name of the HTTP server infrastructure.
pub const HTTP_SERVER_NAME: &str = "httpServer";

/// HTTP server errors
#[derive(Debug, Error)]
pub enum HttpServerError {
    #[error("routes cannot be added after the HTTP server has started")]
    AlreadyStarted,

    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(Method),

    #[error("invalid HTTP server configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}

impl From<HttpServerError> for ModuleError {
    fn from(err: HttpServerError) -> Self {
        match err {
            HttpServerError::InvalidConfig(_) => ModuleError::Configuration(err.to_string()),
            other => ModuleError::Other(other.into()),
        }
    }
}

struct RunningServer {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
    local_addr: SocketAddr,
}

/// The `httpServer` infrastructure.
pub struct HttpServer {
    config: HttpServerConfig,
    /// Routes collected so far; `None` once the server has started.
    routes: Mutex<Option<Router>>,
    running: Mutex<Option<RunningServer>>,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig) -> Self {
        Self {
            config,
            routes: Mutex::new(Some(Router::new())),
            running: Mutex::new(None),
        }
    }

    /// Build from a descriptor's configuration.
    pub fn from_descriptor(descriptor: &ModuleDescriptor) -> Result<Self, HttpServerError> {
        Ok(Self::new(descriptor.parse_configuration()?))
    }

    pub fn config(&self) -> &HttpServerConfig {
        &self.config
    }

    /// Register one endpoint.
    ///
    /// # Panics
    ///
    /// Panics like [`Router::route`] if the same method is registered twice
    /// for one path.
    pub fn add_endpoint<H, T>(
        &self,
        method: Method,
        path: &str,
        handler: H,
    ) -> Result<(), HttpServerError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|_| HttpServerError::UnsupportedMethod(method.clone()))?;
        self.with_routes(|routes| routes.route(path, on(filter, handler)))?;
        info!(method = %method, path = path, "Endpoint registered");
        Ok(())
    }

    /// Merge a whole controller router.
    pub fn add_controller(&self, controller: Router) -> Result<(), HttpServerError> {
        self.with_routes(|routes| routes.merge(controller))
    }

    fn with_routes(&self, f: impl FnOnce(Router) -> Router) -> Result<(), HttpServerError> {
        let mut routes = self.routes.lock();
        let current = routes.take().ok_or(HttpServerError::AlreadyStarted)?;
        *routes = Some(f(current));
        Ok(())
    }

    /// The application built from the routes collected so far, for serving
    /// requests in-process without binding a port.
    pub fn app(&self) -> Result<Router, HttpServerError> {
        let routes = self
            .routes
            .lock()
            .clone()
            .ok_or(HttpServerError::AlreadyStarted)?;
        Ok(build_app(routes, &self.config))
    }

    /// Address the server is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().as_ref().map(|running| running.local_addr)
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }
}

/// Wrap collected routes with the fallback and the middleware stack.
pub fn build_app(routes: Router, config: &HttpServerConfig) -> Router {
    let mut app = routes
        .fallback(route_not_found)
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(ErrorNormalizationLayer::new());

    if let Some(cors) = create_cors_layer(&config.cors) {
        app = app.layer(cors);
    }

    app.layer(TracingLayer::new())
}

async fn route_not_found() -> HttpFailure {
    HttpFailure::route_not_found()
}

#[async_trait]
impl Infrastructure for HttpServer {
    async fn init(&self, ctx: &InfrastructureContext<'_>) -> Result<(), ModuleError> {
        info!(
            name = ctx.descriptor().name(),
            addr = %self.config.bind_addr(),
            "HTTP server initialized"
        );
        Ok(())
    }

    async fn start(&self, _ctx: &InfrastructureContext<'_>) -> Result<(), ModuleError> {
        let routes = self
            .routes
            .lock()
            .take()
            .ok_or(HttpServerError::AlreadyStarted)?;
        let app = build_app(routes, &self.config);

        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!(addr = %local_addr, "HTTP server listening");
        *self.running.lock() = Some(RunningServer {
            shutdown,
            task,
            local_addr,
        });
        Ok(())
    }

    async fn stop(&self, _ctx: &InfrastructureContext<'_>) -> Result<(), ModuleError> {
        let Some(running) = self.running.lock().take() else {
            return Ok(());
        };

        let _ = running.shutdown.send(());
        match running.task.await {
            Ok(Ok(())) => {
                info!(addr = %running.local_addr, "HTTP server stopped");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(error = %e, "HTTP server error");
                Err(e.into())
            }
            Err(e) => Err(ModuleError::Other(anyhow::anyhow!("HTTP server task failed: {e}"))),
        }
    }
}
