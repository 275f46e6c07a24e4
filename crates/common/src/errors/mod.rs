//! Error types for RefScore services
//!
//! Provides a single error taxonomy with:
//! - Distinct error types for hard failures (upstream, configuration, validation)
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling
//!
//! Degraded results (empty searches, provider hiccups during ranking) never reach
//! this type; they are logged and replaced with empty sequences at the point of use.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,

    // External service errors (8xxx)
    UpstreamError,
    ProviderError,
    BatchLookupFailed,
    RefinementFailed,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::ProviderError => 8002,
            ErrorCode::BatchLookupFailed => 8003,
            ErrorCode::RefinementFailed => 8004,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    // External service errors
    #[error("Metadata provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("Batch lookup failed: {message}")]
    BatchLookup { message: String },

    /// Non-2xx from the refinement service. `message` carries the response
    /// `detail` when the body had one.
    #[error("{message}")]
    Refinement { status: u16, message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::Provider { .. } => ErrorCode::ProviderError,
            AppError::BatchLookup { .. } => ErrorCode::BatchLookupFailed,
            AppError::Refinement { .. } => ErrorCode::RefinementFailed,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 500 Internal Server Error
            AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::Provider { .. }
            | AppError::BatchLookup { .. }
            | AppError::Refinement { .. }
            | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Shorthand for a provider failure
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
    /// Mirrors `error.message` so clients that read a flat `detail` field
    /// get a human-readable message.
    pub detail: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            detail: message.clone(),
            error: ErrorDetails {
                code,
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::BatchLookup {
            message: "timeout".into(),
        };
        assert_eq!(err.code(), ErrorCode::BatchLookupFailed);
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.code().as_code(), 8003);
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "manuscript too large".into(),
            field: Some("manuscriptText".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_client_errors_are_validation_only() {
        let errors = [
            AppError::Validation {
                message: "empty".into(),
                field: None,
            },
            AppError::provider("openalex", "429"),
            AppError::Configuration {
                message: "bad url".into(),
            },
        ];
        let client: Vec<ErrorCode> = errors
            .iter()
            .filter(|e| e.is_client_error())
            .map(AppError::code)
            .collect();
        assert_eq!(client, vec![ErrorCode::ValidationError]);
    }

    #[test]
    fn test_refinement_error_displays_detail_only() {
        let err = AppError::Refinement {
            status: 503,
            message: "NLP processor unavailable".into(),
        };
        assert_eq!(err.to_string(), "NLP processor unavailable");
        assert!(err.is_server_error());
    }
}
