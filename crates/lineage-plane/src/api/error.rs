//! API error types and responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lineage_core::{LedgerError, ValidationError};
use serde::Serialize;
use thiserror::Error;

use crate::engine::EngineError;

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Ledger integrity failure: {0}")]
    LedgerIntegrity(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// API error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            ApiError::LedgerIntegrity(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "LEDGER_INTEGRITY",
                msg.clone(),
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(ValidationError::Unauthorized(msg)) => {
                ApiError::Unauthorized(msg)
            }
            EngineError::Validation(inner) => ApiError::BadRequest(inner.to_string()),
            EngineError::Ledger(LedgerError::NotFound(id)) => ApiError::NotFound(id),
            EngineError::Ledger(LedgerError::DuplicateId(id)) => {
                ApiError::Conflict(format!("anchor '{id}' already exists"))
            }
            EngineError::Ledger(LedgerError::AlreadyDeprecated(id)) => {
                ApiError::Conflict(format!("anchor '{id}' is already deprecated"))
            }
            EngineError::Ledger(LedgerError::OutOfOrder { length, requested }) => {
                ApiError::BadRequest(format!(
                    "out-of-order append: ledger length is {length}, requested position {requested}"
                ))
            }
            EngineError::Ledger(inner) => ApiError::LedgerIntegrity(inner.to_string()),
            EngineError::TokenNotFound(id) => ApiError::NotFound(id),
            EngineError::TokenLimitReached(limit) => {
                ApiError::Conflict(format!("active token limit {limit} reached"))
            }
            EngineError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            EngineError::Storage(inner) => ApiError::Internal(inner.to_string()),
        }
    }
}
