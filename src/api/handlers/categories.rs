use axum::{extract::State, http::StatusCode, Json};

use crate::api::{ApiError, ApiPath, ApiResponse, ApiResult, AppState, AuthUser, ValidatedJson};
use crate::models::*;

const NOT_FOUND: &str = "Category not found";

/// Category ids arrive as text so a non-numeric one is the same 404 as an
/// unknown one.
fn category_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse().map_err(|_| ApiError::not_found(NOT_FOUND))
}

pub async fn list_categories(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<CategoryWithCount>>>> {
    let categories = state.db.list_categories(auth.id())?;
    Ok(Json(ApiResponse::ok(categories)))
}

pub async fn create_category(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(input): ValidatedJson<CreateCategoryInput>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Category>>)> {
    let category = state.db.create_category(auth.id(), input)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(category))))
}

pub async fn get_category(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<ApiResponse<Category>>> {
    let id = category_id(&id)?;
    state
        .db
        .get_category(auth.id(), id)?
        .map(|c| Json(ApiResponse::ok(c)))
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))
}

pub async fn update_category(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
    ValidatedJson(input): ValidatedJson<UpdateCategoryInput>,
) -> ApiResult<Json<ApiResponse<Category>>> {
    let id = category_id(&id)?;
    state
        .db
        .update_category(auth.id(), id, input)?
        .map(|c| Json(ApiResponse::ok(c)))
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))
}

pub async fn delete_category(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let id = category_id(&id)?;
    if state.db.delete_category(auth.id(), id)? {
        Ok(Json(ApiResponse::message("Category deleted successfully")))
    } else {
        Err(ApiError::not_found(NOT_FOUND))
    }
}
