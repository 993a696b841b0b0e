//! Error types for the hosting node

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tally_core::LedgerError;
use thiserror::Error;

/// Node errors
#[derive(Error, Debug)]
pub enum NodeError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Missing or invalid caller identity")]
    MissingCaller,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NodeError {
    pub fn status(&self) -> StatusCode {
        match self {
            NodeError::Ledger(LedgerError::Authorization(_)) => StatusCode::FORBIDDEN,
            NodeError::Ledger(LedgerError::Validation(_)) => StatusCode::BAD_REQUEST,
            NodeError::Ledger(LedgerError::Throttle(_)) => StatusCode::TOO_MANY_REQUESTS,
            NodeError::Ledger(LedgerError::CorruptSnapshot(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            NodeError::MissingCaller | NodeError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            NodeError::Config(_) | NodeError::Storage(_) | NodeError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            NodeError::Ledger(e) => e.code(),
            NodeError::MissingCaller => "MISSING_CALLER",
            NodeError::InvalidRequest(_) => "INVALID_REQUEST",
            NodeError::Config(_) => "CONFIG_ERROR",
            NodeError::Storage(_) => "STORAGE_ERROR",
            NodeError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<std::io::Error> for NodeError {
    fn from(err: std::io::Error) -> Self {
        NodeError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(err: serde_json::Error) -> Self {
        NodeError::Storage(format!("snapshot encoding: {}", err))
    }
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));

        (self.status(), body).into_response()
    }
}

pub type NodeResult<T> = Result<T, NodeError>;
