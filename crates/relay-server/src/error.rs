use crate::signaling::SignalingError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use relay_protocol::ErrorBody;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    BadRequest(String),

    #[error("Timed out waiting for answer: {0}")]
    Timeout(String),

    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    #[error("Relay unavailable")]
    Unavailable,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl From<SignalingError> for AppError {
    fn from(err: SignalingError) -> Self {
        match &err {
            SignalingError::Timeout(_) => AppError::Timeout(err.to_string()),
            SignalingError::Negotiation(msg) => AppError::Negotiation(msg.clone()),
            SignalingError::Unavailable => AppError::Unavailable,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Timeout(msg) => {
                tracing::warn!("Offer timed out: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::Negotiation(msg) => {
                tracing::warn!("Negotiation failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::Unavailable => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody::new(message))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
