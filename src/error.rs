use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Outcome of a registry operation that did not go through.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid input")]
    Validation(Vec<FieldError>),

    #[error("{doctor} already has an appointment on {date} at {time}")]
    DoubleBooking {
        /// Doctor as addressed in messages, e.g. "Dr. Smith".
        doctor: String,
        date: chrono::NaiveDate,
        time: chrono::NaiveTime,
    },

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{message}")]
    UniqueViolation {
        field: Option<&'static str>,
        message: String,
    },

    #[error("storage error: {0}")]
    Storage(String),
}

impl RegistryError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        RegistryError::Validation(vec![FieldError::new(field, message)])
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str, String),
    Invalid(Vec<FieldError>),
    NotFound(&'static str, String),
    Internal(String),
}

impl ApiError {
    fn to_error_response(code: &str, message: &str, fields: Vec<FieldError>) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
                fields,
            },
        })
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Validation(fields) => ApiError::Invalid(fields),
            RegistryError::DoubleBooking { .. } => ApiError::BadRequest("DOUBLE_BOOKING", e.to_string()),
            RegistryError::NotFound { .. } => ApiError::NotFound("NOT_FOUND", e.to_string()),
            RegistryError::UniqueViolation { field, message } => match field {
                Some(f) => ApiError::BadRequest("UNIQUE_VIOLATION", format!("{f}: {message}")),
                None => ApiError::BadRequest("UNIQUE_VIOLATION", message),
            },
            RegistryError::Storage(msg) => {
                tracing::error!("{msg}");
                ApiError::Internal("storage failure".into())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        ApiError::Invalid(vec![FieldError::new("body", r.body_text())])
    }
}

impl From<QueryRejection> for ApiError {
    fn from(r: QueryRejection) -> Self {
        ApiError::Invalid(vec![FieldError::new("query", r.body_text())])
    }
}

impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        ApiError::NotFound("NOT_FOUND", "no such resource".into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(code, msg) => (
                StatusCode::BAD_REQUEST,
                ApiError::to_error_response(code, &msg, vec![]),
            )
                .into_response(),
            ApiError::Invalid(fields) => (
                StatusCode::BAD_REQUEST,
                ApiError::to_error_response("VALIDATION_ERROR", "request validation failed", fields),
            )
                .into_response(),
            ApiError::NotFound(code, msg) => (
                StatusCode::NOT_FOUND,
                ApiError::to_error_response(code, &msg, vec![]),
            )
                .into_response(),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::to_error_response("INTERNAL", &msg, vec![]),
            )
                .into_response(),
        }
    }
}
