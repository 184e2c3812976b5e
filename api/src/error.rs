use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use aftercare_core::error::{self, ApiError, CoreError};

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Request-shape problem (400)
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// Anything the care-plan core reports; status depends on the variant
    Core(CoreError),
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        AppError::Core(err)
    }
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
            AppError::Core(CoreError::NotFound { resource }) => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: error::codes::NOT_FOUND.to_string(),
                    message: format!("{resource} not found"),
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: None,
                },
            ),
            AppError::Core(CoreError::ExtractionFormat { reason }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiError {
                    error: error::codes::EXTRACTION_FAILED.to_string(),
                    message: format!("note could not be converted into a care plan: {reason}"),
                    field: Some("note".to_string()),
                    received: None,
                    request_id,
                    docs_hint: Some(
                        "Re-submit the note; the extraction model occasionally returns \
                         output that cannot be recovered."
                            .to_string(),
                    ),
                },
            ),
            AppError::Core(CoreError::Gateway(reason)) => {
                tracing::error!("Extraction gateway error: {}", reason);
                (
                    StatusCode::BAD_GATEWAY,
                    ApiError {
                        error: error::codes::GATEWAY_UNAVAILABLE.to_string(),
                        message: "The extraction model endpoint is unavailable".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
            AppError::Core(err @ (CoreError::Store(_) | CoreError::Cipher(_))) => {
                tracing::error!("Internal error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: "An internal error occurred".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
        };

        (status, Json(api_error)).into_response()
    }
}
