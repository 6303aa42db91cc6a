use axum::http::{HeaderName, Method};
use tower_http::cors::{Any, CorsLayer};

use super::api_key::{API_ID_HEADER, API_KEY_HEADER};

/// Any origin may call the gateway; only the listed headers and methods are allowed.
pub fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("authorization"),
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            HeaderName::from_static("content-type"),
            HeaderName::from_static(API_ID_HEADER),
            HeaderName::from_static(API_KEY_HEADER),
        ])
}
