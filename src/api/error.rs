//! API error mapping
//!
//! | pipeline error        | status |
//! |-----------------------|--------|
//! | `NotFound`            | 404    |
//! | `Ambiguous`           | 400    |
//! | anything else         | 500    |
//!
//! Internal failures answer with a fixed message per route; the cause is
//! logged, not returned.

use crate::error::Error;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Errors returned by HTTP handlers
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request was well-formed JSON but semantically invalid
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A pipeline operation failed
    #[error("{context}: {source}")]
    Pipeline {
        /// Message returned for internal failures
        context: &'static str,
        /// Underlying failure
        #[source]
        source: Error,
    },
}

impl ApiError {
    /// Attach a route-level message to a pipeline error
    pub fn pipeline(context: &'static str) -> impl FnOnce(Error) -> Self {
        move |source| ApiError::Pipeline { context, source }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable message
    pub error: String,
    /// Stable error kind
    pub code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            ApiError::Pipeline { source, context } => match source {
                Error::NotFound(_) => (StatusCode::NOT_FOUND, source.kind(), source.to_string()),
                Error::Ambiguous { .. } => {
                    (StatusCode::BAD_REQUEST, source.kind(), source.to_string())
                }
                _ => {
                    error!(kind = source.kind(), error = %source, "{}", context);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        source.kind(),
                        context.to_string(),
                    )
                }
            },
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                code,
            }),
        )
            .into_response()
    }
}

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;
