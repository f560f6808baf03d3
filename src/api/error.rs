use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::ValidationErrors;

use crate::db::DbError;

/// One rejected input field. `path` uses the wire (camelCase) field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Error type for HTTP handlers.
///
/// Internal errors are logged in full and reach the client only as a
/// generic message.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(path, message)])
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UnknownCategories(ids) => Self::invalid(
                "categoryIds",
                format!("unknown categories: {ids:?}"),
            ),
            DbError::EmailTaken => Self::Conflict("Email is already registered".into()),
            DbError::DuplicateCategory => {
                Self::Conflict("A category with this name already exists".into())
            }
            other => Self::Internal(other.into()),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let path = camel_case(&field);
                errs.iter()
                    .map(move |e| FieldError::new(path.clone(), describe(e)))
            })
            .collect();
        fields.sort_by(|a, b| a.path.cmp(&b.path));
        Self::Validation(fields)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Validation(errors) => {
                tracing::debug!(?errors, "Validation error");
                (
                    StatusCode::BAD_REQUEST,
                    json!({
                        "success": false,
                        "message": "Validation failed",
                        "errors": errors,
                    }),
                )
            }
            ApiError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                json!({ "success": false, "error": msg }),
            ),
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                json!({ "success": false, "error": msg }),
            ),
            ApiError::Conflict(msg) => (
                StatusCode::CONFLICT,
                json!({ "success": false, "error": msg }),
            ),
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({ "success": false, "error": "Too many requests" }),
            ),
            ApiError::Internal(err) => {
                tracing::error!("Internal error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "error": "Internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

fn describe(error: &validator::ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }
    let bound = |key: &str| error.params.get(key).map(|v| v.to_string());
    match (error.code.as_ref(), bound("min"), bound("max")) {
        ("length", Some(min), Some(max)) => format!("must be between {min} and {max} characters"),
        ("length", Some(min), None) => format!("must be at least {min} characters"),
        ("length", None, Some(max)) => format!("must be at most {max} characters"),
        ("email", _, _) => "must be a valid email address".to_string(),
        (code, _, _) => format!("is invalid ({code})"),
    }
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
