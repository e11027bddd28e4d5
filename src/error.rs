use crate::storage::StorageError;
use crate::validation::ValidationError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Product not found: {id}")]
    ProductNotFound { id: String },

    #[error("Route {method} {path} not found")]
    RouteNotFound { method: String, path: String },

    #[error("Malformed request body: {message}")]
    MalformedBody { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        retry_after: Duration,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Body for field-level validation failures
#[derive(Debug, Serialize)]
pub struct FieldErrorResponse {
    pub message: String,
    pub field: String,
}

/// Body for everything that is not a validation failure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Cause of a 500, attached to the response so non-production builds can reveal it
#[derive(Debug, Clone)]
pub struct InternalErrorDetail(pub String);

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                Json(FieldErrorResponse {
                    message: err.message,
                    field: err.field,
                }),
            )
                .into_response(),
            ApiError::ProductNotFound { .. } => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "message": "Product not found" })),
            )
                .into_response(),
            ApiError::RouteNotFound { ref method, ref path } => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new(format!("Route {} {} not found", method, path))),
            )
                .into_response(),
            ApiError::MalformedBody { message } => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
            }
            ApiError::RateLimited {
                message,
                retry_after,
            } => {
                let mut response =
                    (StatusCode::TOO_MANY_REQUESTS, Json(ErrorResponse::new(message))).into_response();
                response.headers_mut().insert(
                    header::RETRY_AFTER,
                    HeaderValue::from(retry_after.as_secs().max(1)),
                );
                response
            }
            ApiError::Storage(_) | ApiError::Internal(_) => {
                let detail = self.to_string();
                tracing::error!(error = %detail, "Request failed");

                let mut response = (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::new(INTERNAL_ERROR_MESSAGE)),
                )
                    .into_response();
                response.extensions_mut().insert(InternalErrorDetail(detail));
                response
            }
        }
    }
}

/// Replace the generic 500 message with the recorded cause
///
/// Only installed outside production.
pub async fn reveal_internal_errors(response: Response) -> Response {
    let detail = match response.extensions().get::<InternalErrorDetail>() {
        Some(detail) => detail.0.clone(),
        None => return response,
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);

    let body = Json(ErrorResponse::new(detail)).into_response().into_body();
    Response::from_parts(parts, body)
}

pub type Result<T> = std::result::Result<T, ApiError>;
