use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    pub status: u16,
}

/// Map domain errors to HTTP responses. The one place response shapes for
/// failures are decided.
pub fn map_error(err: &AppError) -> (StatusCode, ErrorBody) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let error = match err {
        AppError::BadRequest(_) => "validation_error",
        AppError::Unauthorized => "authentication_error",
        AppError::Forbidden => "authorization_error",
        AppError::NotFound => "not_found",
        AppError::PayloadTooLarge { .. } => "payload_too_large",
        AppError::UnsupportedContentType(_) => "unsupported_content_type",
        AppError::Storage(_) => "storage_error",
        AppError::Database(_) => "store_error",
        AppError::Config(_) | AppError::StartServer(_) | AppError::Internal => "server_error",
    };
    let body = ErrorBody {
        error,
        message: err.to_string(),
        status: status.as_u16(),
    };
    (status, body)
}

pub fn into_response(err: AppError) -> impl IntoResponse {
    let (status, body) = map_error(&err);
    (status, Json(body))
}
