use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use assura_core::error::{self, ApiError};
use assura_core::models::ScoreError;
use assura_core::predictions::QueryError;
use assura_core::profile::ProfileError;
use assura_core::recommendation::RecommendationError;

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Validation error (400)
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// Unknown resource (404)
    NotFound { resource: String },
    /// Database error (500)
    Database(sqlx::Error),
    /// Internal error (500)
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();

        let (status, api_error) = match self {
            AppError::Validation {
                message,
                field,
                received,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::VALIDATION_FAILED.to_string(),
                    message,
                    field,
                    received,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: error::codes::NOT_FOUND.to_string(),
                    message: format!("'{resource}' does not exist"),
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: Some("List available models with GET /v1/models.".to_string()),
                },
            ),
            AppError::Database(err) => {
                tracing::error!(request_id = %request_id, "Database error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, internal(request_id))
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = %request_id, "Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, internal(request_id))
            }
        };

        (status, Json(api_error)).into_response()
    }
}

fn internal(request_id: String) -> ApiError {
    ApiError {
        error: error::codes::INTERNAL_ERROR.to_string(),
        message: "An internal error occurred".to_string(),
        field: None,
        received: None,
        request_id,
        docs_hint: None,
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<ProfileError> for AppError {
    fn from(err: ProfileError) -> Self {
        let received = match &err {
            ProfileError::AgeOutOfRange(age) => Some(serde_json::json!(age)),
            ProfileError::InvalidBmi(bmi) => Some(serde_json::json!(bmi)),
            ProfileError::ColumnMismatch { .. } => None,
        };
        AppError::Validation {
            message: err.to_string(),
            field: Some(err.field().to_string()),
            received,
            docs_hint: Some(
                "age must be 0-120, bmi must be > 0; sex is 'male' or 'female'; region is one of \
                 'northeast', 'northwest', 'southeast', 'southwest'."
                    .to_string(),
            ),
        }
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        AppError::Validation {
            message: err.to_string(),
            field: Some(err.field()),
            received: None,
            docs_hint: Some("Range filters are inclusive; min must be <= max.".to_string()),
        }
    }
}

impl From<RecommendationError> for AppError {
    fn from(err: RecommendationError) -> Self {
        AppError::Validation {
            message: err.to_string(),
            field: Some("prediction".to_string()),
            received: None,
            docs_hint: None,
        }
    }
}

impl From<ScoreError> for AppError {
    fn from(err: ScoreError) -> Self {
        AppError::Internal(format!("scoring failed: {err}"))
    }
}
