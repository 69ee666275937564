//! Custom error types for the API service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use places::OwnershipError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::geocoding::GeocodeError;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or invalid credentials, or a non-creator touching a place
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but refused
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request payload failed validation
    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    /// Upstream service failed
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl ApiError {
    pub fn invalid_input() -> Self {
        ApiError::UnprocessableEntity("Invalid inputs passed, please check your data.".to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::UnprocessableEntity(msg)
            | ApiError::BadGateway(msg)
            | ApiError::InternalServerError(msg) => msg,
        }
    }
}

impl From<OwnershipError> for ApiError {
    fn from(err: OwnershipError) -> Self {
        match err {
            OwnershipError::NotFound(_) => {
                ApiError::NotFound("Could not find a place for the provided id.".to_string())
            }
            OwnershipError::UserNotFound(_) => {
                ApiError::NotFound("Could not find user for provided id.".to_string())
            }
            OwnershipError::Unauthorized { .. } => {
                ApiError::Unauthorized("You are not allowed to modify this place.".to_string())
            }
            OwnershipError::EmailTaken(_) => ApiError::UnprocessableEntity(
                "User exists already, please login instead.".to_string(),
            ),
            OwnershipError::TransactionFailure(e) | OwnershipError::PersistenceFailure(e) => {
                error!("Storage failure: {}", e);
                ApiError::InternalServerError(
                    "Something went wrong, please try again later.".to_string(),
                )
            }
        }
    }
}

impl From<GeocodeError> for ApiError {
    fn from(err: GeocodeError) -> Self {
        match err {
            GeocodeError::NoResults => ApiError::UnprocessableEntity(err.to_string()),
            other => {
                error!("Geocoding failed: {}", other);
                ApiError::BadGateway("Could not resolve the address, please try again.".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "message": self.message(),
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
