use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::api::{
    ApiError, ApiPath, ApiQuery, ApiResponse, ApiResult, AppState, AuthUser, CountMeta,
    FieldError, ValidatedJson,
};
use crate::models::*;

/// Raw query string of the notes list. Everything arrives as text so that
/// bad numbers become field errors instead of extractor rejections.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotesParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub category_id: Option<String>,
    pub sort_by: Option<String>,
    pub search: Option<String>,
}

impl ListNotesParams {
    /// Apply defaults, the page size cap and the sort allow-list.
    pub fn resolve(self) -> Result<NoteListQuery, ApiError> {
        let mut errors = Vec::new();
        let page = positive(self.page.as_deref(), 1, "page", &mut errors);
        let limit = positive(self.limit.as_deref(), DEFAULT_PAGE_SIZE, "limit", &mut errors);
        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }

        Ok(NoteListQuery {
            page,
            limit: limit.min(MAX_PAGE_SIZE),
            category: CategoryFilter::parse(self.category_id.as_deref()),
            sort_by: SortBy::parse_lenient(self.sort_by.as_deref()),
            search: self
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        })
    }
}

fn positive(raw: Option<&str>, default: u32, field: &str, errors: &mut Vec<FieldError>) -> u32 {
    match raw.map(str::trim) {
        None | Some("") => default,
        Some(s) => match s.parse::<u32>() {
            Ok(n) if n >= 1 => n,
            _ => {
                errors.push(FieldError::new(field, "must be an integer greater than or equal to 1"));
                default
            }
        },
    }
}

pub async fn list_notes(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<ListNotesParams>,
) -> ApiResult<Json<ApiResponse<Vec<NoteWithCategories>, PageMeta>>> {
    let query = params.resolve()?;
    tracing::debug!(user_id = auth.id(), ?query, "listing notes");

    let page = state.db.list_notes(auth.id(), &query)?;
    Ok(Json(ApiResponse::ok(page.notes).with_meta(page.meta)))
}

pub async fn list_pinned_notes(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<ListNotesParams>,
) -> ApiResult<Json<ApiResponse<Vec<NoteWithCategories>, CountMeta>>> {
    let category = CategoryFilter::parse(params.category_id.as_deref());
    let notes = state.db.list_pinned_notes(auth.id(), category)?;
    let total = notes.len() as u64;
    Ok(Json(ApiResponse::ok(notes).with_meta(CountMeta { total })))
}

pub async fn get_note(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(slug): ApiPath<String>,
) -> ApiResult<Json<ApiResponse<NoteWithCategories>>> {
    state
        .db
        .get_note_by_slug(auth.id(), &slug)?
        .map(|note| Json(ApiResponse::ok(note)))
        .ok_or_else(|| ApiError::not_found("Note not found"))
}

pub async fn create_note(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(input): ValidatedJson<CreateNoteInput>,
) -> ApiResult<(StatusCode, Json<ApiResponse<NoteWithCategories>>)> {
    let note = state.db.create_note(auth.id(), input)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(note))))
}

pub async fn update_note(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(slug): ApiPath<String>,
    ValidatedJson(input): ValidatedJson<UpdateNoteInput>,
) -> ApiResult<Json<ApiResponse<NoteWithCategories>>> {
    state
        .db
        .update_note(auth.id(), &slug, input)?
        .map(|note| Json(ApiResponse::ok(note)))
        .ok_or_else(|| {
            ApiError::not_found("Note not found or you don't have permission to edit it")
        })
}

pub async fn delete_note(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(slug): ApiPath<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    if state.db.delete_note(auth.id(), &slug)? {
        Ok(Json(ApiResponse::message("Note deleted successfully")))
    } else {
        Err(ApiError::not_found("Note not found"))
    }
}

pub async fn toggle_pin(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<ApiResponse<PinToggle>>> {
    let not_found = || ApiError::not_found("Note not found or access denied");

    let id: i64 = id.parse().map_err(|_| not_found())?;
    let toggled = state.db.toggle_pin(auth.id(), id)?.ok_or_else(not_found)?;

    let message = if toggled.is_pinned {
        "Note pinned successfully"
    } else {
        "Note unpinned successfully"
    };
    Ok(Json(ApiResponse::ok(toggled).with_message(message)))
}
