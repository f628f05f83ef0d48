use std::collections::BTreeMap;

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        message: String,
        details: BTreeMap<String, Vec<String>>,
    },
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Unauthorized(String),
    #[error("invalid token")]
    InvalidToken,
    #[error("expired token")]
    ExpiredToken,
    #[error("{0}")]
    Forbidden(String),
    #[error("{}", not_found_message(.resource, .id))]
    NotFound {
        resource: &'static str,
        id: Option<i32>,
    },
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    ForeignKey(String),
    #[error("database error: {0}")]
    Database(DbErr),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

fn not_found_message(resource: &str, id: &Option<i32>) -> String {
    match id {
        Some(id) => format!("{resource} with id {id} not found"),
        None => format!("{resource} not found"),
    }
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut details = BTreeMap::new();
        details.insert(field.to_string(), vec![message.into()]);
        AppError::Validation {
            message: "validation failed".to_string(),
            details,
        }
    }

    pub fn not_found(resource: &'static str, id: i32) -> Self {
        AppError::NotFound {
            resource,
            id: Some(id),
        }
    }

    pub fn forbidden() -> Self {
        AppError::Forbidden("you do not have permission to access this resource".to_string())
    }

    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Validation { message, .. } => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message.clone())
            }
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "invalid credentials".to_string(),
            ),
            AppError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message.clone())
            }
            // Expired and malformed tokens look the same to the client.
            AppError::InvalidToken | AppError::ExpiredToken => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "invalid or expired token".to_string(),
            ),
            AppError::Forbidden(message) => (StatusCode::FORBIDDEN, "FORBIDDEN", message.clone()),
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            AppError::Conflict(message) => (StatusCode::CONFLICT, "CONFLICT", message.clone()),
            AppError::ForeignKey(message) => (
                StatusCode::BAD_REQUEST,
                "FOREIGN_KEY_VIOLATION",
                message.clone(),
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "database operation failed".to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "an unexpected error occurred".to_string(),
            ),
        }
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                tracing::debug!(%detail, "unique constraint violated");
                AppError::Conflict("resource already exists".to_string())
            }
            Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
                tracing::debug!(%detail, "foreign key constraint violated");
                AppError::ForeignKey("referenced resource does not exist".to_string())
            }
            _ => AppError::Database(err),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();
        AppError::Validation {
            message: "validation failed".to_string(),
            details,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation(format!("invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::validation(format!("invalid path parameters: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::validation(format!("invalid query parameters: {}", rejection.body_text()))
    }
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorDetail,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            tracing::error!(error = ?self, code, "request failed");
        } else {
            tracing::warn!(error = %self, code, "request rejected");
        }

        let details = match self {
            AppError::Validation { details, .. } if !details.is_empty() => Some(details),
            _ => None,
        };

        let body = ErrorBody {
            success: false,
            error: ErrorDetail {
                code,
                message,
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
