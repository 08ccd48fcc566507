//! CORS middleware.
//!
//! Translates [`CorsConfig`] into a tower-http [`CorsLayer`]. A `"*"` entry
//! in origins or headers allows any value; entries that do not parse are
//! skipped with a warning instead of failing server start.

use crate::config::CorsConfig;
use axum::http::{HeaderName, HeaderValue, Method};
use std::str::FromStr;
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::warn;

const WILDCARD: &str = "*";

/// The CORS layer for `config`, or `None` when CORS is disabled.
pub fn create_cors_layer(config: &CorsConfig) -> Option<CorsLayer> {
    if !config.enabled {
        return None;
    }

    let layer = CorsLayer::new()
        .allow_origin(allow_origin(&config.allowed_origins))
        .allow_methods(AllowMethods::list(parsed::<Method>("method", &config.allowed_methods)))
        .allow_headers(allow_headers(&config.allowed_headers))
        .max_age(Duration::from_secs(config.max_age));
    Some(layer)
}

fn allow_origin(origins: &[String]) -> AllowOrigin {
    if is_wildcard(origins) {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(parsed::<HeaderValue>("origin", origins))
    }
}

fn allow_headers(headers: &[String]) -> AllowHeaders {
    if is_wildcard(headers) {
        AllowHeaders::any()
    } else {
        AllowHeaders::list(parsed::<HeaderName>("header", headers))
    }
}

fn is_wildcard(values: &[String]) -> bool {
    values.iter().any(|value| value == WILDCARD)
}

fn parsed<T: FromStr>(what: &'static str, values: &[String]) -> Vec<T> {
    values
        .iter()
        .filter_map(|value| match value.parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                warn!(entry = %value, "Ignoring invalid CORS {what}");
                None
            }
        })
        .collect()
}
