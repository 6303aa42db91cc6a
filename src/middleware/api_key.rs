use crate::{app::AppState, error::GatewayError, services::RequestContext};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

pub const API_ID_HEADER: &str = "x-api-id";
pub const API_KEY_HEADER: &str = "x-api-key";

/// Caller identity, validated from the API credential headers.
///
/// Handlers take this as an argument; a request without valid credentials
/// never reaches them.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub RequestContext);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
        };

        let ctx = state
            .credentials
            .validate(header(API_ID_HEADER), header(API_KEY_HEADER))
            .await?;

        tracing::debug!(user_id = %ctx.user_id, "API credentials accepted");
        Ok(AuthenticatedUser(ctx))
    }
}
