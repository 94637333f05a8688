use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("url is required")]
    MissingUrl,

    #[error("Model artifact missing: {}", path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("Model artifact invalid ({}): {reason}", path.display())]
    ArtifactInvalid { path: PathBuf, reason: String },

    #[error("Model cannot produce a class distribution: {0}")]
    UninferableModel(InferenceError),

    #[error("Model inference error: {0}")]
    ModelInference(InferenceError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Short label used for the `prediction_errors_total` counter.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::MissingUrl => "missing_url",
            AppError::ArtifactMissing { .. } => "artifact_missing",
            AppError::ArtifactInvalid { .. } => "artifact_invalid",
            AppError::UninferableModel(_) => "uninferable_model",
            AppError::ModelInference(_) => "model_inference",
            AppError::Config(_) => "config",
            AppError::Serialization(_) => "serialization",
            AppError::Io(_) => "io",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::MissingUrl => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::ArtifactMissing { .. } | AppError::ArtifactInvalid { .. } => {
                tracing::error!("Artifacts unavailable: {}", self);
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            _ => {
                tracing::error!("Internal server error: {}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

/// Typed failure of a single inference capability. The probability
/// resolver only demotes to the next tier on one of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("expected {expected} features, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("invalid class distribution: {0}")]
    InvalidDistribution(String),

    #[error("decision margin is not finite: {0}")]
    NonFiniteMargin(f64),

    #[error("multi-class decision function with {0} margins is not supported")]
    MulticlassMargin(usize),

    #[error("malformed decision tree: {0}")]
    MalformedTree(String),

    #[error("predicted class index {index} outside {len} known classes")]
    LabelOutOfRange { index: usize, len: usize },
}

pub fn artifact_invalid(path: impl Into<PathBuf>, reason: impl ToString) -> AppError {
    AppError::ArtifactInvalid {
        path: path.into(),
        reason: reason.to_string(),
    }
}
