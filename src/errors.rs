//! Error handling for the medv_serve runtime
//!
//! One structured error type covers the whole service. The taxonomy matters
//! operationally: `Validation` and `Scoring` are per-request and surface to
//! the caller, `Config` and `Artifact` are startup failures that must abort
//! before the listener binds.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use thiserror::Error;

/// Main error type for the medv_serve service
#[derive(Error, Debug)]
pub enum MedvError {
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Artifact error: {path}: {message}")]
    Artifact { path: String, message: String },

    #[error("Scoring error: {message}")]
    Scoring { message: String },
}

/// Type alias for Result with MedvError
pub type MedvResult<T> = Result<T, MedvError>;

impl MedvError {
    /// Create a validation error for a named input field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an artifact error for a file on disk
    pub fn artifact(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Artifact {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a scoring error
    pub fn scoring(message: impl Into<String>) -> Self {
        Self::Scoring {
            message: message.into(),
        }
    }

    /// True for errors that must abort startup rather than fail one request
    pub fn is_fatal(&self) -> bool {
        matches!(self, MedvError::Config { .. } | MedvError::Artifact { .. })
    }
}

#[derive(Serialize)]
struct ErrBody {
    success: bool,
    error: String,
}

impl IntoResponse for MedvError {
    fn into_response(self) -> Response {
        let status = match self {
            MedvError::Validation { .. } => StatusCode::BAD_REQUEST,
            // Startup-class errors only reach a handler if something is
            // deeply wrong; treat them as server faults.
            MedvError::Config { .. } | MedvError::Artifact { .. } | MedvError::Scoring { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrBody {
            success: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
