use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use stayline_core::admission::AdmissionError;
use stayline_core::booking::TransitionError;
use stayline_core::repository::StoreError;

#[derive(Debug)]
pub enum AppError {
    Authentication(String),
    Authorization(String),
    Validation(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Authentication(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Authorization(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<AdmissionError> for AppError {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::InvalidRange
            | AdmissionError::InvalidGuests
            | AdmissionError::Unavailable
            | AdmissionError::CapacityExceeded { .. } => AppError::Validation(err.to_string()),
            AdmissionError::PropertyNotFound => AppError::NotFound(err.to_string()),
            AdmissionError::DateConflict => AppError::Conflict(err.to_string()),
            AdmissionError::Store(e) => e.into(),
        }
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::Conflict(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound("booking not found".to_string()),
            // The exclusion constraint lost us the check-then-create race;
            // surface it the same way the admission pre-check would have.
            StoreError::Conflict => {
                AppError::Conflict("property is already booked for the selected dates".to_string())
            }
            StoreError::Backend(msg) => AppError::Internal(msg),
        }
    }
}
