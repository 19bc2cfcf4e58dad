use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A JWT segment could not be decoded or parsed.
    #[error("Malformed token")]
    MalformedToken,

    /// A token whose `exp` claim is in the past (or missing).
    #[error("Token expired")]
    ExpiredToken,

    /// The backend rejected the refresh token or could not be reached.
    #[error("Session refresh failed")]
    RefreshFailed,

    /// A required setting is absent or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Ciphertext was short, corrupt or not valid UTF-8 once decrypted.
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// An encryption error.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// A non-2xx answer from the backend.
    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// A transport-level failure talking to the backend.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// An I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An authentication error.
    #[error("Authentication required")]
    Unauthenticated,

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl From<garde::Report> for AppError {
    fn from(report: garde::Report) -> Self {
        AppError::Validation(report.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::MalformedToken | AppError::ExpiredToken | AppError::Unauthenticated => {
                tracing::warn!("Authentication failed: {}", self);
                (StatusCode::UNAUTHORIZED, "Authentication required".to_string())
            }

            AppError::RefreshFailed => {
                tracing::warn!("Session refresh failed");
                (StatusCode::UNAUTHORIZED, "Session expired, please sign in again".to_string())
            }

            AppError::Configuration(ref msg) => {
                tracing::error!("Configuration error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Service misconfigured".to_string())
            }

            AppError::Decryption(ref msg) => {
                tracing::error!("Decryption error: {}", msg);
                (StatusCode::UNPROCESSABLE_ENTITY, "Credential decryption failed".to_string())
            }

            AppError::Encryption(ref msg) => {
                tracing::error!("Encryption error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Credential encryption failed".to_string())
            }

            AppError::Upstream { status, ref message } => {
                tracing::warn!("Upstream error ({}): {}", status, message);
                let code = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                (code, message.clone())
            }

            AppError::Http(ref e) => {
                tracing::error!("Backend unreachable: {}", e);
                (StatusCode::BAD_GATEWAY, "Backend unavailable".to_string())
            }

            AppError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "File system error".to_string())
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "success": false,
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"success":false,"error":"Internal server error"}"#.to_string());

        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}
