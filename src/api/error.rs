use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::db::StoreError;
use crate::services::{ApprovalError, RecordsError, SubmissionError};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    StoreError(String),

    ExternalApiError { service: String, message: String },

    ValidationError(String),

    /// Rejected form input, reported against one field.
    FieldError { field: String, message: String },

    Conflict(String),

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::StoreError(msg) => write!(f, "Store error: {msg}"),
            Self::ExternalApiError { service, message } => {
                write!(f, "{service} error: {message}")
            }
            Self::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            Self::FieldError { field, message } => write!(f, "Invalid {field}: {message}"),
            Self::Conflict(msg) => write!(f, "Conflict: {msg}"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut field = None;
        let (status, error_message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::StoreError(msg) => {
                tracing::error!("Store error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    format!("The episode store is unavailable: {msg}"),
                )
            }
            Self::ExternalApiError { service, message } => {
                tracing::warn!("{} API error: {}", service, message);
                (
                    StatusCode::BAD_GATEWAY,
                    format!("{service} service is unavailable"),
                )
            }
            Self::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::FieldError {
                field: name,
                message,
            } => {
                field = Some(name);
                (StatusCode::UNPROCESSABLE_ENTITY, message)
            }
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let mut body = ApiResponse::<()>::error(error_message);
        body.field = field;
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::not_found("Record", id),
            other => Self::StoreError(other.to_string()),
        }
    }
}

impl From<RecordsError> for ApiError {
    fn from(err: RecordsError) -> Self {
        match err {
            RecordsError::NotFound(id) => Self::not_found("Record", id),
            RecordsError::NotEditing(_) => Self::Conflict(err.to_string()),
            RecordsError::ConfirmationRequired(_) => {
                Self::validation(format!("{err}; pass confirm=true"))
            }
            RecordsError::Store(e) => e.into(),
        }
    }
}

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        match err.field() {
            Some(field) => Self::FieldError {
                field: field.to_string(),
                message: err.to_string(),
            },
            None => Self::Conflict(err.to_string()),
        }
    }
}

impl From<ApprovalError> for ApiError {
    fn from(err: ApprovalError) -> Self {
        Self::Conflict(err.to_string())
    }
}

impl ApiError {
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        Self::NotFound(format!("{resource} {id} not found"))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }
}
