use std::io;

use thiserror::Error;

use crate::auth::InitDataError;

/// Core error type for the AuraSync backend
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Authentication(InitDataError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        AppError::Database(error.to_string())
    }
}

impl From<InitDataError> for AppError {
    fn from(error: InitDataError) -> Self {
        match error {
            // An unparseable payload is the caller's formatting problem,
            // not an authentication failure.
            InitDataError::MalformedPayload(msg) => AppError::Validation(msg),
            other => AppError::Authentication(other),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
