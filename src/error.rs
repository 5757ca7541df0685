use crate::models::Feature;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Request body could not be interpreted as a passenger record
    #[error("Invalid request payload: {0}")]
    InvalidPayload(String),

    /// A feature value has the wrong type
    #[error("Invalid value for feature '{feature}': {message}")]
    InvalidFeature { feature: Feature, message: String },

    /// The payload cannot be aligned to the training columns
    #[error("Input data missing expected feature: '{0}'")]
    MissingFeature(Feature),

    /// The payload carries none of the passenger features
    #[error("Input data contains none of the expected features: {}", Feature::ALL.map(|f| f.to_string()).join(", "))]
    NoFeatures,

    /// No fitted pipeline is available to the service
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Training dataset file does not exist
    #[error("Training dataset not found: {}", .0.display())]
    DatasetNotFound(PathBuf),

    /// Training dataset is malformed or unusable
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Fitting the pipeline failed
    #[error("Training error: {0}")]
    Training(String),

    /// Model artifact is unreadable or inconsistent
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidFeature { .. } => StatusCode::BAD_REQUEST,
            AppError::MissingFeature(_) => StatusCode::BAD_REQUEST,
            AppError::NoFeatures => StatusCode::BAD_REQUEST,
            AppError::ModelUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DatasetNotFound(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Dataset(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Training(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Artifact(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::InvalidPayload(_) => "INVALID_PAYLOAD",
            AppError::InvalidFeature { .. } => "INVALID_FEATURE",
            AppError::MissingFeature(_) => "MISSING_FEATURE",
            AppError::NoFeatures => "NO_FEATURES",
            AppError::ModelUnavailable(_) => "MODEL_UNAVAILABLE",
            AppError::DatasetNotFound(_) => "DATASET_NOT_FOUND",
            AppError::Dataset(_) => "DATASET_ERROR",
            AppError::Training(_) => "TRAINING_ERROR",
            AppError::Artifact(_) => "ARTIFACT_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True when the caller sent something the service cannot use
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(
                error_code = error_code,
                status_code = status.as_u16(),
                message = %message,
                "Request error"
            );
        } else {
            tracing::warn!(
                error_code = error_code,
                status_code = status.as_u16(),
                message = %message,
                "Rejected request"
            );
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from bincode::Error
impl From<bincode::Error> for AppError {
    fn from(err: bincode::Error) -> Self {
        AppError::Artifact(err.to_string())
    }
}

/// Conversion from csv::Error
impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Dataset(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
