use crate::{
    app::AppState,
    error::GatewayError,
    middleware::AuthenticatedUser,
    models::{ApiResponse, Deposit, DepositStatus},
    services::deposit::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT},
};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

/// Query string for GET; every field is optional and validated by hand so
/// that bad input gets the JSON error envelope.
#[derive(Debug, Default, Deserialize)]
pub struct DepositQuery {
    pub ref_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<String>,
}

pub async fn create_deposit(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<Deposit>>), GatewayError> {
    let amount = parse_amount(&body)?;
    let deposit = state.deposits.create(&ctx, amount).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(deposit))))
}

/// Single lookup when `ref_id` is present, otherwise a filtered listing.
pub async fn get_deposits(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    Query(query): Query<DepositQuery>,
) -> Result<Response, GatewayError> {
    if let Some(ref_id) = query.ref_id.as_deref().filter(|r| !r.is_empty()) {
        let deposit = state.deposits.lookup(&ctx, ref_id).await?;
        return Ok(Json(ApiResponse::success(deposit)).into_response());
    }

    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<DepositStatus>)
        .transpose()
        .map_err(GatewayError::BadRequest)?;
    let limit = parse_limit(query.limit.as_deref())?;

    let deposits = state.deposits.list(&ctx, status, limit).await?;
    Ok(Json(ApiResponse::success(deposits)).into_response())
}

pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

fn parse_amount(body: &[u8]) -> Result<i64, GatewayError> {
    let invalid = || GatewayError::BadRequest("Amount must be positive".to_string());

    let value: serde_json::Value = serde_json::from_slice(body).map_err(|_| invalid())?;
    let amount = value.get("amount").ok_or_else(invalid)?;
    if let Some(whole) = amount.as_i64() {
        return if whole > 0 { Ok(whole) } else { Err(invalid()) };
    }

    // i64::MAX rounds up to 2^63 as f64, so the bound is exclusive.
    match amount.as_f64() {
        Some(f) if f > 0.0 && f.fract() == 0.0 && f < i64::MAX as f64 => Ok(f as i64),
        _ => Err(invalid()),
    }
}

fn parse_limit(raw: Option<&str>) -> Result<usize, GatewayError> {
    let Some(raw) = raw.filter(|r| !r.is_empty()) else {
        return Ok(DEFAULT_LIST_LIMIT);
    };

    match raw.parse::<usize>() {
        Ok(limit) if (1..=MAX_LIST_LIMIT).contains(&limit) => Ok(limit),
        _ => Err(GatewayError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_LIST_LIMIT
        ))),
    }
}
