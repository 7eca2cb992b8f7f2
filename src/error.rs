use std::time::Duration;

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::filter::FilterError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Request did not carry a usable `url`.
    #[error("URL is required")]
    MissingUrl,

    #[error("URL exceeds {0} bytes")]
    UrlTooLong(usize),

    /// Destination could not be cleaned.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] FilterError),

    /// Unknown, expired or unreadable token.
    #[error("URL not found")]
    NotFound,

    #[error("rate limit exceeded")]
    RateLimited { retry_after: Duration },

    #[error("failed to register URL: {0}")]
    RegistrationFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingUrl | Self::UrlTooLong(_) | Self::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::RegistrationFailed(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // fixed strings only, the Display impl may carry internal detail
    fn public_message(&self) -> &'static str {
        match self {
            Self::MissingUrl => "URL is required",
            Self::UrlTooLong(_) => "URL is too long",
            Self::InvalidUrl(_) => "Invalid URL",
            Self::NotFound => "URL not found",
            Self::RateLimited { .. } => "Rate limit exceeded. Try again later.",
            Self::RegistrationFailed(_) => "Failed to register URL",
            Self::Internal(_) => "Internal server error",
        }
    }
}

impl From<StoreError> for RelayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EmptyUrl => Self::MissingUrl,
            StoreError::NotFound => Self::NotFound,
            StoreError::Cipher(e) => Self::RegistrationFailed(e.to_string()),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            Self::RegistrationFailed(detail) | Self::Internal(detail) => {
                tracing::error!(status = status.as_u16(), detail = %detail, "request failed");
            }
            _ => tracing::debug!(status = status.as_u16(), error = %self, "request rejected"),
        }

        let body = Json(serde_json::json!({ "error": self.public_message() }));
        let mut response = (status, body).into_response();

        if let Self::RateLimited { retry_after } = self {
            // whole seconds, never 0
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }
        response
    }
}
