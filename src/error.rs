use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::services::replicate::ReplicateError;
use crate::services::storage::StorageError;

/// API-level error taxonomy mapped onto HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Insufficient credits")]
    InsufficientCredits,

    #[error("{0}")]
    Validation(String),

    #[error("Restoration not found")]
    NotFound,

    #[error("Replicate API error")]
    Upstream(#[from] ReplicateError),

    #[error("Failed to create accessible image URL")]
    Storage(#[from] StorageError),

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, json!({ "error": "Unauthorized" }))
            }
            ApiError::InsufficientCredits => (
                StatusCode::PAYMENT_REQUIRED,
                json!({ "error": "Insufficient credits" }),
            ),
            ApiError::Validation(message) => {
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                json!({ "error": "Restoration not found" }),
            ),
            ApiError::Upstream(err) => {
                tracing::error!(error = %err, "Replicate API error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Replicate API error", "details": err.to_string() }),
                )
            }
            ApiError::Storage(err) => {
                tracing::error!(error = %err, "Failed to create accessible image URL");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "Failed to create accessible image URL",
                        "details": err.to_string()
                    }),
                )
            }
            ApiError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Database error", "details": err.to_string() }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        let cases = [
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ApiError::InsufficientCredits, StatusCode::PAYMENT_REQUIRED),
            (
                ApiError::Validation("No image URL provided".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::NotFound, StatusCode::NOT_FOUND),
            (
                ApiError::Database(sqlx::Error::PoolClosed),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
