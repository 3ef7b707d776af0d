//! HTTP error mapping.
//!
//! Domain errors become 4xx responses with a short message. Store failures
//! are logged here and reach the client only as a generic 500.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::AppError;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request parameters")]
    InvalidRequest,

    #[error("user_id is required")]
    MissingUserId,

    #[error("invalid user_id format")]
    InvalidUserId,

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("wallet not found")]
    WalletNotFound,

    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest
            | Self::MissingUserId
            | Self::InvalidUserId
            | Self::InsufficientBalance => StatusCode::BAD_REQUEST,
            Self::WalletNotFound => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::WalletNotFound(_) => ApiError::WalletNotFound,
            AppError::InsufficientBalance { .. } => ApiError::InsufficientBalance,
            AppError::StoreFailure(_) => {
                tracing::error!(
                    error = %err,
                    retryable = err.is_retryable(),
                    "store failure while handling request"
                );
                ApiError::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::InvalidRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::InsufficientBalance.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::WalletNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Internal.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_failure_hides_details() {
        let err: ApiError = AppError::StoreFailure(anyhow::anyhow!("database is locked")).into();
        assert!(matches!(err, ApiError::Internal));
        assert_eq!(err.to_string(), "internal server error");
    }

    #[test]
    fn test_domain_errors_map_to_client_errors() {
        let not_found: ApiError = AppError::WalletNotFound(42).into();
        assert!(matches!(not_found, ApiError::WalletNotFound));

        let insufficient: ApiError = AppError::InsufficientBalance {
            user_id: 2,
            balance: 10,
            required: 20,
        }
        .into();
        assert!(matches!(insufficient, ApiError::InsufficientBalance));
    }
}
