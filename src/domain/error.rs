use std::path::PathBuf;

use thiserror::Error;

use crate::api::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response: {0}")]
    Parse(String),

    #[error("Disk error: {0}")]
    Disk(String),

    #[error("File already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Download cancelled")]
    Cancelled,

    #[error("Could not open browser: {0}")]
    Browser(String),
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::InvalidResponse(msg) => AppError::Parse(msg),
            ApiError::InvalidInput(msg) => AppError::InvalidInput(msg),
            other => AppError::Network(other.to_string()),
        }
    }
}
