use crate::{
    app::AppState,
    error::GatewayError,
    middleware::AuthenticatedUser,
    models::{ApiResponse, Credentials, ProfileView},
};
use axum::{extract::State, Json};

pub async fn get_profile(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
) -> Result<Json<ApiResponse<ProfileView>>, GatewayError> {
    let profile = state.credentials.profile(&ctx).await?;
    Ok(Json(ApiResponse::success(profile.into())))
}

pub async fn rotate_credentials(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
) -> Result<Json<ApiResponse<Credentials>>, GatewayError> {
    let credentials = state.credentials.rotate(&ctx).await?;
    Ok(Json(ApiResponse::success(credentials)))
}
