use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::ResponseStatus;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Provider rejected the call; status and message are passed through as-is.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("{0}")]
    PersistenceError(String),

    #[error("{0}")]
    InternalError(String),

    #[error("Internal server error: {0}")]
    AnyhowError(#[from] anyhow::Error),
}

/// Failures inside a deposit store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Ledger error: {0}")]
    Ledger(String),
}

/// Failures talking to the payment provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

impl From<ProviderError> for GatewayError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Rejected { status, message } => GatewayError::Upstream { status, message },
            ProviderError::Transport(e) => {
                tracing::warn!("Payment provider transport error: {}", e);
                GatewayError::Upstream {
                    status: StatusCode::BAD_GATEWAY.as_u16(),
                    message: "Payment provider unavailable".to_string(),
                }
            }
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub status: ResponseStatus,
    pub message: String,
    pub error_code: String,
    pub timestamp: chrono::DateTime<Utc>,
    pub request_id: String,
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::Unauthorized(_) => "UNAUTHORIZED",
            GatewayError::BadRequest(_) => "BAD_REQUEST",
            GatewayError::NotFound(_) => "NOT_FOUND",
            GatewayError::Upstream { .. } => "UPSTREAM_ERROR",
            GatewayError::PersistenceError(_) => "PERSISTENCE_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        // Internal details stay in the logs.
        let message = match &self {
            GatewayError::AnyhowError(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = ErrorResponse {
            status: ResponseStatus::Error,
            message,
            error_code: error_code.to_string(),
            timestamp: Utc::now(),
            request_id: Uuid::new_v4().to_string(),
        };

        if status.is_server_error() {
            tracing::error!(error = ?self, error_code = error_code, "Request failed");
        } else {
            tracing::warn!(error = %self, error_code = error_code, "Request rejected");
        }

        (status, Json(body)).into_response()
    }
}
