//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("duplicate {kind}: {name}")]
    Duplicate { kind: &'static str, name: String },
    #[error("unknown attribute '{attribute}' on entity '{entity}'")]
    UnknownAttribute { entity: String, attribute: String },
    #[error("unknown relation '{relation}' from entity '{entity}'")]
    UnknownRelation { entity: String, relation: String },
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// One failed attribute rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
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

/// Failure reported by a data-access collaborator.
///
/// `Validation` is the only kind that maps to a client error; every other kind is an
/// infrastructure failure.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("constraint: {0}")]
    Constraint(String),
    #[error("backend: {0}")]
    Backend(String),
}

impl DataError {
    pub fn is_validation(&self) -> bool {
        matches!(self, DataError::Validation(_))
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {}", summarize(.0))]
    Validation(Vec<FieldError>),
    #[error(transparent)]
    Data(DataError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unresolved search path: {0}")]
    UnresolvedSearchPath(String),
}

impl From<DataError> for AppError {
    fn from(e: DataError) -> Self {
        match e {
            DataError::Validation(errors) => AppError::Validation(errors),
            other => AppError::Data(other),
        }
    }
}

impl AppError {
    /// Machine-readable code used in the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation_error",
            AppError::Data(DataError::Constraint(_)) => "constraint_error",
            AppError::Data(_) => "database_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::UnresolvedSearchPath(_) => "unresolved_search_path",
        }
    }

    /// Default status when the error escapes outside a pipeline run.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Data(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::BadRequest(_) | AppError::UnresolvedSearchPath(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Validation(errors) => serde_json::to_value(errors).ok(),
            _ => None,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                details: self.details(),
            },
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_body())).into_response()
    }
}
