//! Unified error handling with Sentry integration.
//!
//! Waitlist operations never fail at the repository boundary, so only the
//! outer surfaces (request decoding, CSV export) produce an `AppError`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::services::waitlist::ExportError;

/// Application-level error type for the site.
#[derive(Debug, Error)]
pub enum AppError {
    /// Building the CSV export failed.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(self, Self::Export(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Export(_) => "Something went wrong. Please try again.".to_string(),
            Self::BadRequest(_) => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::BadRequest("missing email".to_string());
        assert_eq!(err.to_string(), "Bad request: missing email");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Export(ExportError::Io(std::io::Error::other(
                "disk full"
            )))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
