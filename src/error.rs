use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;

use crate::store::EntityKind;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

/// Typed failures surfaced by the query and mutation services.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{}", describe_violations(.0))]
    Validation(Vec<FieldViolation>),

    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: i32 },

    #[error("no fields supplied for update")]
    NoFieldsSupplied,

    #[error("{field} is already taken")]
    Uniqueness { field: String },

    #[error("database unavailable: {0}")]
    Connectivity(String),

    #[error(transparent)]
    Unexpected(DbErr),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

impl CatalogError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldViolation::new(field, message)])
    }

    pub fn not_found(entity: EntityKind, id: i32) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            CatalogError::Validation(_)
            | CatalogError::NoFieldsSupplied
            | CatalogError::Uniqueness { .. } => StatusCode::BAD_REQUEST,
            CatalogError::NotFound { .. } => StatusCode::NOT_FOUND,
            CatalogError::Connectivity(_) | CatalogError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    /// Message safe to show to an end user; store internals are logged instead.
    pub fn public_message(&self) -> String {
        match self {
            CatalogError::Connectivity(detail) => {
                tracing::error!(error = %detail, "catalog store unreachable");
                "database unavailable".to_string()
            },
            CatalogError::Unexpected(err) => {
                tracing::error!(error = %err, "unexpected catalog failure");
                "internal server error".to_string()
            },
            other => other.to_string(),
        }
    }
}

impl From<DbErr> for CatalogError {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            return Self::Uniqueness { field: violated_column(&detail) };
        }
        match err {
            DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => Self::Connectivity(err.to_string()),
            other => Self::Unexpected(other),
        }
    }
}

impl From<validator::ValidationErrors> for CatalogError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut violations: Vec<FieldViolation> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{field} is invalid"));
                    FieldViolation::new(field.to_string(), message)
                })
            })
            .collect();
        violations.sort_by(|a, b| a.field.cmp(&b.field));
        Self::Validation(violations)
    }
}

fn describe_violations(violations: &[FieldViolation]) -> String {
    let parts: Vec<&str> = violations.iter().map(|v| v.message.as_str()).collect();
    format!("invalid input: {}", parts.join("; "))
}

/// Pulls the column name out of a constraint message such as
/// `UNIQUE constraint failed: users.username`.
fn violated_column(detail: &str) -> String {
    detail
        .rsplit(|c: char| c == '.' || c == ' ')
        .next()
        .map(|s| s.trim_matches(|c: char| !c.is_alphanumeric() && c != '_'))
        .filter(|s| !s.is_empty())
        .unwrap_or("value")
        .to_string()
}

/// Error rendered as an HTML page by the web surface.
#[derive(Debug)]
pub struct AppError(CatalogError);

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for AppError {}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        Self(err)
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        Self(CatalogError::from(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = crate::templates::error_page(self.0.public_message());
        (self.0.status(), Html(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
