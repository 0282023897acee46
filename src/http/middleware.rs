//! Cross-origin policy shared by the CORS layer and the WebSocket upgrade

use axum::http::{header::HeaderValue, Method};
use tower_http::cors::CorsLayer;

/// CORS layer for the allow-listed origins. Unparseable entries are skipped.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
}

/// Whether a WebSocket upgrade may proceed.
///
/// Browsers don't apply CORS to WebSocket handshakes, so the `Origin`
/// header is checked here. Requests without one (non-browser clients) and
/// same-origin requests from the bundled client are let through.
pub fn origin_allowed(origin: Option<&str>, host: Option<&str>, allowed: &[String]) -> bool {
    let Some(origin) = origin else {
        return true;
    };
    let origin = origin.trim_end_matches('/');

    if allowed.iter().any(|a| a == origin) {
        return true;
    }

    match (host, origin.split_once("://")) {
        (Some(host), Some((_, authority))) => authority.eq_ignore_ascii_case(host),
        _ => false,
    }
}
