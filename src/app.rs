use crate::{
    handlers::*,
    middleware::create_cors_layer,
    services::{Analytics, CredentialValidator, DepositService, DepositStore},
};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub deposits: Arc<DepositService>,
    pub credentials: Arc<CredentialValidator>,
    pub store: Arc<dyn DepositStore>,
    pub analytics: Arc<Analytics>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Public endpoints
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        // Credentialed endpoints
        .route(
            "/api/v1/deposits",
            get(get_deposits).post(create_deposit).options(preflight),
        )
        .route("/api/v1/profile", get(get_profile).options(preflight))
        .route(
            "/api/v1/profile/credentials",
            post(rotate_credentials).options(preflight),
        )
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false)),
        )
        .layer(create_cors_layer())
}
