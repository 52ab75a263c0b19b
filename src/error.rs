//! Error taxonomy for the object store
//!
//! All operations surface a `StoreError` carrying an HTTP-equivalent status
//! and a symbolic code, so HTTP handlers can propagate with `?` and callers
//! embedding the store as a library can match on the kind.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Missing connection URI: fatal at initialization, never retried.
    #[error("Missing `uri` definition!")]
    MissingUri,

    /// The caller handed us something invalid (non-stream entity, malformed id).
    #[error("{message}")]
    BadRequest { message: String },

    /// No object exists under the requested logical name.
    #[error("{message}")]
    NotFound { message: String },

    /// Declared contract point without an implementation behind it.
    #[error("`{operation}` is not implemented")]
    Unimplemented { operation: &'static str },

    /// Backend query or transfer failure. Propagated, never retried.
    #[error("backend error: {message}")]
    Backend { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        StoreError::BadRequest {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        StoreError::NotFound {
            message: message.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend {
            message: message.into(),
        }
    }

    pub fn unimplemented(operation: &'static str) -> Self {
        StoreError::Unimplemented { operation }
    }

    /// Symbolic code surfaced alongside the status in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::MissingUri => "ERR_CONFIG",
            StoreError::BadRequest { .. } => "E_BAD_REQUEST",
            StoreError::NotFound { .. } => "ERR_NOT_FOUND",
            StoreError::Unimplemented { .. } => "ERR_NOT_IMPLEMENTED",
            StoreError::Backend { .. } | StoreError::Io(_) => "ERR_BACKEND",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            StoreError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::Unimplemented { .. } => StatusCode::NOT_IMPLEMENTED,
            StoreError::MissingUri | StoreError::Backend { .. } | StoreError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl ResponseError for StoreError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status()).json(json!({
            "code": self.code(),
            "status": self.status().as_u16(),
            "message": self.to_string(),
        }))
    }
}
