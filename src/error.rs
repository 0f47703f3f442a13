use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::credentials::CredentialError;

/// Request-time error types with appropriate HTTP status codes.
///
/// Startup failures (bad configuration, unreadable key file) never reach this
/// type; they are reported by `main` and terminate the process.
///
/// # Execution Errors
///
/// Both variants surface to clients as the same generic `execution_error`
/// with status 500. The distinction exists for server-side logs and metrics:
///
/// - `ExecutionFailed` - the script could not be launched or exited non-zero
/// - `ExecutionTimeout` - the script outlived its deadline and was killed
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Invalid JSON body: {0}")]
    InvalidJson(#[from] JsonRejection),

    #[error("Script execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Script exceeded its deadline of {0:?}")]
    ExecutionTimeout(Duration),

    #[error("Key file error: {0}")]
    KeyFile(#[from] CredentialError),
}

/// Error response body for API endpoints.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Full detail stays in the server log, clients get a sanitized message
        tracing::error!(error = %self, "Request failed");

        let (status, error_type, message) = match &self {
            AppError::ExecutionFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "execution_error",
                "Endpoint script failed. Check the gateway logs for details.".to_string(),
            ),
            AppError::ExecutionTimeout(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "execution_error",
                "Endpoint script did not complete in time.".to_string(),
            ),
            AppError::KeyFile(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Service keys are unavailable.".to_string(),
            ),

            // Client errors - safe to show the message as it's user-facing
            AppError::InvalidJson(rejection) => {
                let status = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    StatusCode::PAYLOAD_TOO_LARGE
                } else {
                    StatusCode::BAD_REQUEST
                };
                (status, "bad_request", sanitize_json_rejection(rejection))
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Turn a JSON extractor rejection into a client-facing message.
///
/// Serde messages can name internal types, so only the useful fragment (the
/// offending field) is kept.
fn sanitize_json_rejection(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            "Expected request with `Content-Type: application/json`".to_string()
        }
        JsonRejection::JsonSyntaxError(_) => "Malformed JSON in request body".to_string(),
        JsonRejection::JsonDataError(e) => sanitize_serde_message(&e.body_text()),
        JsonRejection::BytesRejection(_) => "Failed to read request body".to_string(),
        _ => "Invalid request format".to_string(),
    }
}

fn sanitize_serde_message(msg: &str) -> String {
    if msg.contains("missing field")
        && let Some(start) = msg.find('`')
        && let Some(end) = msg[start + 1..].find('`')
    {
        let field = &msg[start + 1..start + 1 + end];
        return format!("Missing required field: {field}");
    }

    if msg.contains("invalid type") {
        return "Invalid data type in request body".to_string();
    }

    "Invalid request format".to_string()
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
