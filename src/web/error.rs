//! HTTP mapping for [`crate::errors::Error`].
//!
//! Client mistakes get a specific message. Storage and internal failures are logged
//! here with full detail and answered with a generic message only.

use crate::errors::Error;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, warn};

/// Body of every response that is not a data payload
#[derive(Debug, Serialize)]
pub struct ApiMessage {
    /// Whether the operation happened
    pub success: bool,
    /// Human-readable outcome
    pub message: String,
}

impl ApiMessage {
    /// A success message
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// A failure message
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl Error {
    /// Status code and caller-facing message for this error.
    fn to_status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::InvalidPartySize { .. } => (
                StatusCode::BAD_REQUEST,
                "Please enter a valid party size".to_string(),
            ),
            Self::InvalidStatus { .. }
            | Self::UnknownSetting { .. }
            | Self::InvalidRequest { .. } => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            Self::Unauthorized | Self::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            Self::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            Self::TicketNotFound { .. } => (StatusCode::NOT_FOUND, self.to_string()),
            Self::IllegalTransition { .. } => (StatusCode::CONFLICT, self.to_string()),
            Self::LockedOut => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many failed login attempts, start a new session".to_string(),
            ),
            Self::StorageContention { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "The queue is busy, please try again".to_string(),
            ),
            Self::Config { .. } | Self::Database(_) | Self::Io(_) | Self::PasswordHash { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong".to_string(),
            ),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = self.to_status_and_message();
        if status.is_server_error() {
            if self.is_retryable() {
                warn!("Request failed with retryable error: {}", self);
            } else {
                error!("Request failed: {}", self);
            }
        }
        (status, Json(ApiMessage::failure(message))).into_response()
    }
}
