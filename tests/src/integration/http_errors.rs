//! # HTTP Error Envelope
//!
//! A module contributes failing endpoints to the `httpServer`; every
//! failure must come back as `{"error": {...}}` with the right status.
//!
//! ## Failure Classes Tested
//!
//! 1. Domain errors (record-not-found and validation)
//! 2. Protocol errors carrying their own status
//! 3. Malformed JSON payloads
//! 4. Unclassified errors and panics
//! 5. Routing failures (unknown route, wrong method)
//! 6. Framework rejections (unparsable path parameters)
//! 7. Content negotiation on the built-in JSON endpoints

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::extract::Path;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Json;
    use connector_http::envelope::{codes, messages};
    use connector_http::{HttpFailure, HttpServer, HttpServerConfig, JsonBody, HTTP_SERVER_NAME};
    use connector_runtime::{CoreHttpApiModule, CORE_HTTP_API_NAME};
    use module_registry::{ModuleContext, ModuleError, ModuleRegistry, RuntimeModule};
    use serde_json::{json, Value};
    use shared_bus::EventBus;
    use shared_types::{sentinels, DomainError, ProtocolError, ModuleDescriptor};
    use std::collections::HashSet;
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Module exposing one endpoint per failure class.
    struct OrdersModule;

    #[async_trait]
    impl RuntimeModule for OrdersModule {
        async fn init(&self, ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
            let http = ctx.get_by_name::<HttpServer>(HTTP_SERVER_NAME)?;

            http.add_endpoint(Method::GET, "/orders/:id", || async {
                Err::<Json<Value>, _>(HttpFailure::from(sentinels::transport_record_not_found(
                    "Order", "ORD1",
                )))
            })?;
            http.add_endpoint(
                Method::GET,
                "/orders/:id/lines/:line",
                |Path((id, line)): Path<(String, u32)>| async move {
                    Json(json!({ "order": id, "line": line }))
                },
            )?;
            http.add_endpoint(Method::POST, "/orders", |JsonBody(order): JsonBody<Value>| async move {
                if order.get("amount").is_none() {
                    return Err(HttpFailure::from(DomainError::new(
                        "error.runtime.validation.invalidPropertyValue",
                        "amount is required",
                    )));
                }
                Ok((StatusCode::CREATED, JsonBody(order)))
            })?;
            http.add_endpoint(Method::GET, "/upstream", || async {
                let error = ProtocolError::new("error.platform.unavailable", "backbone down", 503)
                    .with_context(json!({ "attempts": 3 }));
                Err::<Json<Value>, _>(HttpFailure::from(error))
            })?;
            http.add_endpoint(Method::GET, "/disk", || async {
                Err::<Json<Value>, HttpFailure>(anyhow::anyhow!("disk full").into())
            })?;
            http.add_endpoint(Method::GET, "/panic", || async {
                if true {
                    panic!("invariant violated");
                }
                "unreachable"
            })?;
            Ok(())
        }

        async fn start(&self, _ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
            Ok(())
        }

        async fn stop(&self, _ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
            Ok(())
        }
    }

    /// Initialized registry with the orders module mounted.
    async fn server() -> Arc<HttpServer> {
        let registry = ModuleRegistry::new(Arc::new(EventBus::new()));
        let http = registry
            .register_infrastructure(
                ModuleDescriptor::new(HTTP_SERVER_NAME),
                HttpServer::new(HttpServerConfig::default()),
            )
            .unwrap();
        registry
            .register_module(ModuleDescriptor::new("orders"), OrdersModule)
            .unwrap();
        registry
            .register_module(
                ModuleDescriptor::new(CORE_HTTP_API_NAME),
                CoreHttpApiModule::default(),
            )
            .unwrap();
        registry.init_all().await.unwrap();
        http.instance().clone()
    }

    async fn send(http: &HttpServer, request: Request<Body>) -> (StatusCode, Value) {
        let response = http.app().unwrap().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// Envelope shape shared by every failure.
    fn assert_envelope(body: &Value) -> &Value {
        let outer = body.as_object().unwrap();
        assert_eq!(outer.len(), 1, "only the `error` key: {body}");
        let error = &body["error"];
        assert!(!error["id"].as_str().unwrap().is_empty());
        assert!(error["code"].is_string());
        assert!(error["message"].is_string());
        assert!(error.get("statusCode").is_none());
        assert!(error.get("status_code").is_none());
        error
    }

    fn assert_client_facing(error: &Value) {
        assert!(error.get("stacktrace").is_none());
        assert!(error.get("details").is_none());
    }

    #[tokio::test]
    async fn test_record_not_found_is_404() {
        let http = server().await;
        let (status, body) = send(&http, get("/orders/ORD1")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        let error = assert_envelope(&body);
        assert_eq!(error["code"], sentinels::TRANSPORT_RECORD_NOT_FOUND);
        assert!(error["message"].as_str().unwrap().contains("ORD1"));
        assert_client_facing(error);
    }

    #[tokio::test]
    async fn test_validation_domain_error_is_400() {
        let http = server().await;
        let (status, body) = send(&http, post_json("/orders", r#"{"currency":"EUR"}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error = assert_envelope(&body);
        assert_eq!(error["message"], "amount is required");
        assert_client_facing(error);
    }

    #[tokio::test]
    async fn test_valid_payload_succeeds() {
        let http = server().await;
        let (status, body) = send(&http, post_json("/orders", r#"{"amount":5}"#)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({ "amount": 5 }));
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let http = server().await;
        let (status, body) = send(&http, post_json("/orders", "{amount:")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error = assert_envelope(&body);
        assert_eq!(error["code"], codes::INVALID_JSON_IN_PAYLOAD);
        assert_eq!(error["message"], messages::INVALID_JSON_IN_PAYLOAD);
        assert_client_facing(error);
    }

    #[tokio::test]
    async fn test_protocol_error_keeps_its_status() {
        let http = server().await;
        let (status, body) = send(&http, get("/upstream")).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let error = assert_envelope(&body);
        assert_eq!(error["code"], "error.platform.unavailable");
        assert_eq!(error["message"], "backbone down");
        assert!(error["stacktrace"].is_array());
        assert!(error["details"].is_string());
    }

    #[tokio::test]
    async fn test_unclassified_error_is_500() {
        let http = server().await;
        let (status, body) = send(&http, get("/disk")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let error = assert_envelope(&body);
        assert_eq!(error["code"], codes::UNEXPECTED);
        assert_eq!(error["message"], messages::UNEXPECTED);
        assert_eq!(error["details"], "disk full");
    }

    #[tokio::test]
    async fn test_panic_is_500() {
        let http = server().await;
        let (status, body) = send(&http, get("/panic")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let error = assert_envelope(&body);
        assert_eq!(error["code"], codes::UNEXPECTED);
        assert!(error["details"]
            .as_str()
            .unwrap()
            .contains("invariant violated"));
    }

    #[tokio::test]
    async fn test_routing_failures() {
        let http = server().await;

        let (status, body) = send(&http, get("/invoices")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(assert_envelope(&body)["code"], codes::ROUTE_DOES_NOT_EXIST);

        let request = Request::delete("/orders").body(Body::empty()).unwrap();
        let (status, body) = send(&http, request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(assert_envelope(&body)["code"], codes::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_unparsable_path_parameter_is_400() {
        let http = server().await;

        let (status, body) = send(&http, get("/orders/ORD1/lines/first")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error = assert_envelope(&body);
        assert_eq!(error["code"], codes::REQUEST_REJECTED);
        assert!(error["message"].as_str().unwrap().contains("first"));

        let (status, body) = send(&http, get("/orders/ORD1/lines/2")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "order": "ORD1", "line": 2 }));
    }

    #[tokio::test]
    async fn test_unacceptable_accept_header_is_406() {
        let http = server().await;
        let request = Request::get("/health")
            .header(header::ACCEPT, "text/html")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(&http, request).await;
        assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
        let error = assert_envelope(&body);
        assert_eq!(error["code"], codes::NOT_ACCEPTABLE);
        assert_eq!(error["message"], messages::NOT_ACCEPTABLE);
        assert_client_facing(error);
    }

    #[tokio::test]
    async fn test_every_failure_gets_a_fresh_id() {
        let http = server().await;
        let mut ids = HashSet::new();
        for _ in 0..10 {
            let (_, body) = send(&http, get("/orders/ORD1")).await;
            ids.insert(body["error"]["id"].as_str().unwrap().to_string());
        }
        assert_eq!(ids.len(), 10);
    }
}
