use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// No model API key is configured. Disables AI features, not the app.
    MissingApiKey,
    /// Network/HTTP failure against the model endpoint that survived all retries.
    RemoteApi(String),
    /// The endpoint returned 200 but the body could not be navigated to the
    /// generated text. Callers substitute their documented default.
    MalformedResponse(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// Internal server error.
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::MissingApiKey => write!(f, "Model API key is not configured"),
            AppError::RemoteApi(msg) => write!(f, "Model API error: {}", msg),
            AppError::MalformedResponse(msg) => write!(f, "Malformed model response: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each error variant to an appropriate HTTP status code and JSON body.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::MissingApiKey => {
                tracing::warn!("Request needed the model API but no key is configured");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "AI features are disabled (no API key configured)".to_string(),
                )
            }
            AppError::RemoteApi(msg) => {
                tracing::error!("Model API error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Model service error".to_string())
            }
            AppError::MalformedResponse(msg) => {
                tracing::error!("Malformed model response: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Model returned an unusable response".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::RemoteApi(err.to_string())
    }
}
