//! API error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} is not configured")]
    ProviderConfigMissing(&'static str),

    /// Non-success response from a remote provider, propagated with the
    /// upstream status and body.
    #[error("upstream error ({status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("{0}")]
    Validation(String),

    #[error("No cart items found in session metadata")]
    EmptyCart,

    #[error("No shipping address found")]
    MissingRecipient,

    #[error("Payment not completed")]
    PaymentNotCompleted,

    #[error("Checkout session not found")]
    SessionNotFound,

    #[error("request to provider failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            // Upstream bodies are proxied verbatim when they are JSON.
            Self::Upstream { status, body } => {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                match serde_json::from_str::<Value>(&body) {
                    Ok(value) => (status, Json(value)).into_response(),
                    Err(_) => (status, Json(json!({ "error": body }))).into_response(),
                }
            }
            Self::ProviderConfigMissing(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": self.to_string() }))).into_response()
            }
            Self::SessionNotFound => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": self.to_string() }))).into_response()
            }
            Self::Http(_) => {
                (StatusCode::BAD_GATEWAY, Json(json!({ "error": self.to_string() }))).into_response()
            }
            Self::Validation(_) | Self::EmptyCart | Self::MissingRecipient | Self::PaymentNotCompleted => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": self.to_string() }))).into_response()
            }
        }
    }
}
