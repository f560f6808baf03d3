//! Request extractors: the authenticated user, plus body, query and path
//! extractors whose rejections use the JSON error shape.

use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use validator::Validate;

use super::error::ApiError;
use super::AppState;
use crate::models::User;

/// The user behind the `Authorization: Bearer <token>` header.
///
/// Rejects with 401 when the header is missing, malformed, or the token is
/// unknown or expired.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

impl AuthUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                tracing::warn!("Missing Authorization header");
                ApiError::Unauthorized("Missing Authorization header".into())
            })?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                tracing::warn!("Invalid Authorization header format");
                ApiError::Unauthorized("Expected: Bearer <token>".into())
            })?;

        let user = state.db.find_session_user(token)?.ok_or_else(|| {
            tracing::warn!("Invalid or expired session token");
            ApiError::Unauthorized("Invalid or expired session".into())
        })?;

        Ok(AuthUser {
            user,
            token: token.to_string(),
        })
    }
}

/// JSON body that has passed its `validator` rules.
///
/// Malformed JSON is reported through the same validation error shape as
/// rule violations.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::invalid("body", rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Query string extractor. A query that does not deserialize (duplicate keys,
/// wrong shapes) is a validation error on `query`.
#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::invalid("query", rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Path parameter extractor. A segment that does not parse names no
/// resource, so it is a 404.
#[derive(Debug, Clone)]
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                tracing::debug!("Rejected path: {}", rejection.body_text());
                ApiError::not_found("Resource not found")
            })?;
        Ok(Self(value))
    }
}
