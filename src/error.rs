use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::any::Any;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid request. Messages array is required.")]
    InvalidRequest,

    #[error("Server configuration error")]
    MissingCredential,

    #[error("Daily message limit reached")]
    RateLimited { limit: u32 },

    #[error("Failed to get response from AI service")]
    Upstream { status: StatusCode, details: String },

    #[error("Internal server error")]
    Internal(String),
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        RelayError::Internal(e.to_string())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let error = self.to_string();
        match self {
            RelayError::InvalidRequest => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": error }))).into_response()
            }
            RelayError::MissingCredential => {
                error!("DEEPSEEK_API_KEY is not set");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": error }))).into_response()
            }
            RelayError::RateLimited { limit } => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": error, "limit": limit, "remaining": 0 })),
            )
                .into_response(),
            RelayError::Upstream { status, details } => {
                warn!(%status, %details, "upstream returned an error");
                (status, Json(json!({ "error": error, "details": details }))).into_response()
            }
            RelayError::Internal(message) => internal_error(message),
        }
    }
}

fn internal_error(message: String) -> Response {
    error!(%message, "error processing chat request");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error", "message": message })),
    )
        .into_response()
}

// Renders a handler panic with the same envelope as any other internal error
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    internal_error(message)
}
