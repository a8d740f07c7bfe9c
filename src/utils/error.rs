//! Error types and handling
//!
//! Common error types used across the application.

use crate::capture::traits::CaptureError;
use crate::config::ConfigError;
use crate::container::ContainerError;
use crate::recorder::channel::RecordingError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    #[error("Platform error: {0}")]
    Platform(#[from] CaptureError),

    #[error("Unknown window: {0}")]
    UnknownWindow(isize),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Error response for the UI surface
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Recording(RecordingError::Dependency(_)) => "DEPENDENCY_MISSING",
            AppError::Recording(RecordingError::MidSession(_)) => "RECORDING_FAILED",
            AppError::Recording(_) => "RECORDING_ERROR",
            AppError::Container(_) => "CONTAINER_ERROR",
            AppError::Platform(_) => "PLATFORM_ERROR",
            AppError::UnknownWindow(_) => "UNKNOWN_WINDOW",
            AppError::InvalidCommand(_) => "INVALID_COMMAND",
            AppError::Task(_) => "TASK_FAILED",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mid_session_failure_has_distinct_code() {
        let error = AppError::from(RecordingError::MidSession("disk full".to_string()));
        let response = ErrorResponse::from(error);
        assert_eq!(response.code, "RECORDING_FAILED");
        assert!(response.message.contains("disk full"));
    }

    #[test]
    fn test_dependency_error_code() {
        let error = AppError::from(RecordingError::Dependency("no display".to_string()));
        assert_eq!(ErrorResponse::from(error).code, "DEPENDENCY_MISSING");
    }
}
