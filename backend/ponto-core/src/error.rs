// src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::competence::CompetenceError;
use crate::payroll::EventCodeError;
use crate::schedule::RuleError;

// --- Collaborator Errors ---

/// Failure of an external collaborator (backend API or local store).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("JSON serialization/deserialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("URL parsing failed: {0}")]
    Url(#[from] url::ParseError),
    #[error("Backend returned an error: {status} - {message:?}")]
    Api { status: u16, message: Option<String> },
    #[error("Backend rate limit exceeded")]
    RateLimited,
    #[error("{what} '{id}' not found")]
    NotFound { what: &'static str, id: String },
    #[error("Invalid schedule rule: {0}")]
    InvalidRule(#[from] RuleError),
    #[error("Rejected by store: {0}")]
    Rejected(String),
    #[error("Failed to acquire lock")]
    LockError,
}

// --- Engine Errors ---

#[derive(Error, Debug)]
pub enum EngineError {
    /// A read failed; nothing computed from partial data is returned.
    #[error("Failed to read {what}: {source}")]
    Read {
        what: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("Failed to ensure event catalog: {0}")]
    Catalog(#[source] StoreError),
    #[error("Invalid event codes: {0}")]
    InvalidEventCodes(#[from] EventCodeError),
    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Worker pool closed")]
    PoolClosed,
}

impl EngineError {
    pub fn read(what: &'static str) -> impl FnOnce(StoreError) -> EngineError {
        move |source| EngineError::Read { what, source }
    }
}

// --- Application Errors ---

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Competence(#[from] CompetenceError),
    #[error("Employee '{0}' not found")]
    EmployeeNotFound(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

// Map AppError to Axum's IntoResponse
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Error occurred: {}", self);

        let (status_code, message) = match &self {
            AppError::MissingEnvVar(_) | AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Configuration error.".to_string(),
            ),
            AppError::TlsConfig(_) | AppError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error. Check logs.".to_string(),
            ),
            AppError::Competence(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::EmployeeNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Engine(EngineError::Read { source, .. })
            | AppError::Engine(EngineError::Catalog(source)) => match source {
                StoreError::RateLimited => (
                    StatusCode::TOO_MANY_REQUESTS,
                    "Backend rate limit exceeded, retry later.".to_string(),
                ),
                StoreError::Api { status, .. } => (
                    StatusCode::BAD_GATEWAY,
                    format!("Backend request failed (Status {}). Details logged.", status),
                ),
                _ => (
                    StatusCode::BAD_GATEWAY,
                    "Backend request failed. Details logged.".to_string(),
                ),
            },
            AppError::Engine(EngineError::InvalidEventCodes(e)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::Engine(EngineError::Join(_)) | AppError::Engine(EngineError::PoolClosed) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error (worker task).".to_string(),
            ),
        };

        (status_code, Json(json!({ "error": message }))).into_response()
    }
}
