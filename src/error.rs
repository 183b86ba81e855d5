//! Error types for actorhub
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Variants carry a message naming the operation that failed, so the
/// context survives propagation through `?`.
#[derive(Debug, Error)]
pub enum AppError {
    /// Entity absent (404)
    #[error("Resource not found")]
    NotFound,

    /// Malformed acct URI or user address (400)
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Remote server answered with a non-2xx status or could not be reached (502)
    #[error("Remote error: {message}")]
    Remote {
        status: Option<u16>,
        message: String,
    },

    /// PEM or DER key material could not be decoded (500)
    #[error("Key parse error: {0}")]
    KeyParse(String),

    /// Key material is well-formed but not an RSA key (500)
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// The signing primitive failed (500)
    #[error("Signature error: {0}")]
    Signature(String),

    /// Activity type has no handler at this endpoint (422)
    #[error("Unsupported activity type: {0}")]
    UnsupportedActivityType(String),

    /// Login failed; deliberately does not say why (401)
    #[error("Authentication failed")]
    AuthenticationFailure,

    /// Malformed input (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unique constraint violated (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Build a `Remote` error from a transport failure.
    pub fn transport(context: &str, error: reqwest::Error) -> Self {
        AppError::Remote {
            status: error.status().map(|s| s.as_u16()),
            message: format!("{}: {}", context, error),
        }
    }

    /// Build a `Remote` error from an unexpected response status.
    pub fn status(context: &str, status: reqwest::StatusCode) -> Self {
        AppError::Remote {
            status: Some(status.as_u16()),
            message: format!("{}: status code {}", context, status.as_u16()),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message, error_type) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), "not_found"),
            AppError::InvalidAddress(_) => {
                (StatusCode::BAD_REQUEST, self.to_string(), "invalid_address")
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), "validation"),
            AppError::AuthenticationFailure => (
                StatusCode::UNAUTHORIZED,
                self.to_string(),
                "authentication",
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone(), "conflict"),
            AppError::UnsupportedActivityType(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                self.to_string(),
                "unsupported_activity",
            ),
            AppError::Remote { .. } => (StatusCode::BAD_GATEWAY, self.to_string(), "remote"),
            AppError::KeyParse(_) | AppError::UnsupportedKeyType(_) | AppError::Signature(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Cryptographic error".to_string(),
                "crypto",
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
                "database",
            ),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "config"),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "internal",
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, kind = error_type, "Request failed");
        } else {
            tracing::debug!(error = %self, kind = error_type, "Request rejected");
        }

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[error_type])
            .inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_activity_maps_to_unprocessable() {
        let response = AppError::UnsupportedActivityType("Like".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn crypto_errors_do_not_leak_details() {
        let response = AppError::KeyParse("bad base64 at line 3".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn remote_status_error_carries_status_code() {
        match AppError::status("failed to post inbox", reqwest::StatusCode::FORBIDDEN) {
            AppError::Remote { status, message } => {
                assert_eq!(status, Some(403));
                assert!(message.contains("failed to post inbox"));
            }
            other => panic!("expected remote error, got: {other:?}"),
        }
    }
}
