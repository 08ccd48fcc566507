//! # Core HTTP API Module
//!
//! Registers the runtime's own endpoints on the `httpServer`:
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /health` | component states, 200 when every enabled component is started, 503 otherwise |
//! | `GET /Monitoring/Version` | crate name and version |
//! | `GET /docs`, `GET /api-docs*` | 301 to `/docs/json` (docs enabled only) |
//! | `GET /docs/json` | the API document loaded from `docs.path` (docs enabled only) |
//!
//! The JSON endpoints answer `406` when the `Accept` header rules out JSON.

use async_trait::async_trait;
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use connector_http::{ensure_accepts_json, HttpFailure, HttpServer, HTTP_SERVER_NAME};
use module_registry::{ComponentStatus, ModuleContext, ModuleError, RegistryView, RuntimeModule};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_types::{LifecycleState, ModuleDescriptor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Registry name of the core HTTP API module.
pub const CORE_HTTP_API_NAME: &str = "coreHttpApi";

const DOCS_JSON_PATH: &str = "/docs/json";

/// Configuration of the `coreHttpApi` module.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CoreHttpApiConfig {
    pub docs: DocsConfig,
}

/// API documentation settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DocsConfig {
    pub enabled: bool,
    /// JSON document served at `/docs/json`. Required when enabled.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    components: Vec<ComponentStatus>,
}

/// The `coreHttpApi` module.
#[derive(Debug, Default)]
pub struct CoreHttpApiModule {
    config: CoreHttpApiConfig,
}

impl CoreHttpApiModule {
    pub fn new(config: CoreHttpApiConfig) -> Self {
        Self { config }
    }

    pub fn from_descriptor(descriptor: &ModuleDescriptor) -> Result<Self, ModuleError> {
        let config = descriptor.parse_configuration().map_err(|e| {
            ModuleError::configuration(format!("invalid {CORE_HTTP_API_NAME} configuration: {e}"))
        })?;
        Ok(Self::new(config))
    }

    fn add_documentation(&self, http: &HttpServer) -> Result<(), ModuleError> {
        let document = Arc::new(load_document(self.config.docs.path.as_deref())?);

        for path in ["/docs", "/api-docs", "/api-docs/*rest"] {
            http.add_endpoint(Method::GET, path, || async { redirect_to_docs() })?;
        }
        http.add_endpoint(Method::GET, DOCS_JSON_PATH, move |headers: HeaderMap| {
            let document = Arc::clone(&document);
            async move {
                ensure_accepts_json(&headers)?;
                Ok::<_, HttpFailure>(Json(Value::clone(&document)))
            }
        })?;
        Ok(())
    }
}

#[async_trait]
impl RuntimeModule for CoreHttpApiModule {
    async fn init(&self, ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
        let http = ctx.get_by_name::<HttpServer>(HTTP_SERVER_NAME)?;

        let view = ctx.registry_view();
        http.add_endpoint(Method::GET, "/health", move |headers: HeaderMap| {
            let view = view.clone();
            async move {
                ensure_accepts_json(&headers)?;
                Ok::<_, HttpFailure>(health(&view))
            }
        })?;
        http.add_endpoint(Method::GET, "/Monitoring/Version", |headers: HeaderMap| async move {
            ensure_accepts_json(&headers).map(|()| version())
        })?;

        if self.config.docs.enabled {
            self.add_documentation(&http)?;
        }

        info!(docs = self.config.docs.enabled, "[CoreHttpApi] Endpoints registered");
        Ok(())
    }

    async fn start(&self, _ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
        Ok(())
    }

    async fn stop(&self, _ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
        Ok(())
    }
}

fn health(view: &RegistryView) -> (StatusCode, Json<HealthReport>) {
    let components = view.states();
    let healthy = components
        .iter()
        .filter(|component| component.enabled)
        .all(|component| component.state == LifecycleState::Started);

    let (status, label) = if healthy {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        status,
        Json(HealthReport {
            status: label,
            components,
        }),
    )
}

fn version() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn redirect_to_docs() -> impl IntoResponse {
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, DOCS_JSON_PATH)],
    )
}

fn load_document(path: Option<&Path>) -> Result<Value, ModuleError> {
    let path =
        path.ok_or_else(|| ModuleError::configuration("docs.path is required when docs are enabled"))?;
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| {
        ModuleError::configuration(format!("invalid API document {}: {e}", path.display()))
    })
}
