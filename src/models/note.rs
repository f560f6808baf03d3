use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::CategorySummary;

/// Upper bound on the requested page size; larger requests are clamped.
pub const MAX_PAGE_SIZE: u32 = 20;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// A note row as stored.
///
/// `content` is always sanitized HTML. The `slug` is fixed at creation time
/// and survives title changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub user_id: i64,
    pub is_pinned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A note together with the categories it is filed under, which is the shape
/// every notes endpoint responds with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteWithCategories {
    #[serde(flatten)]
    pub note: Note,
    pub categories: Vec<CategorySummary>,
}

/// Input for creating a note.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteInput {
    #[validate(custom(function = "crate::models::validate_title"))]
    pub title: String,
    #[validate(length(max = 100_000))]
    pub content: String,
    #[validate(custom(function = "crate::models::validate_ids"))]
    pub category_ids: Option<Vec<i64>>,
    pub is_pinned: Option<bool>,
}

/// Input for updating a note. All fields are optional for partial updates.
///
/// A present `category_ids` replaces the whole association set, so an empty
/// list clears every category.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteInput {
    #[validate(custom(function = "crate::models::validate_title"))]
    pub title: Option<String>,
    #[validate(length(max = 100_000))]
    pub content: Option<String>,
    #[validate(custom(function = "crate::models::validate_ids"))]
    pub category_ids: Option<Vec<i64>>,
    pub is_pinned: Option<bool>,
}

/// Sort keys accepted by the notes list.
///
/// Unknown values fall back to [`SortBy::UpdatedAt`] instead of failing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    UpdatedAt,
    CreatedAt,
    TitleAsc,
    TitleDesc,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpdatedAt => "updatedAt",
            Self::CreatedAt => "createdAt",
            Self::TitleAsc => "titleAsc",
            Self::TitleDesc => "titleDesc",
        }
    }

    pub fn parse_lenient(s: Option<&str>) -> Self {
        match s {
            Some("createdAt") => Self::CreatedAt,
            Some("titleAsc") => Self::TitleAsc,
            Some("titleDesc") => Self::TitleDesc,
            _ => Self::UpdatedAt,
        }
    }

    /// The ORDER BY clause for this key. Ties fall back to id so paging is stable.
    pub fn order_clause(&self) -> &'static str {
        match self {
            Self::UpdatedAt => "n.updated_at DESC, n.id DESC",
            Self::CreatedAt => "n.created_at DESC, n.id DESC",
            Self::TitleAsc => "n.title COLLATE NOCASE ASC, n.id DESC",
            Self::TitleDesc => "n.title COLLATE NOCASE DESC, n.id DESC",
        }
    }
}

/// How the list is narrowed to a category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    /// `categoryId` absent or `all`.
    #[default]
    Any,
    Only(i64),
    /// `categoryId` was present but not a number; matches nothing.
    Invalid,
}

impl CategoryFilter {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") | Some("all") => Self::Any,
            Some(s) => s.parse().map(Self::Only).unwrap_or(Self::Invalid),
        }
    }
}

/// A fully resolved notes list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteListQuery {
    pub page: u32,
    /// Already clamped to [`MAX_PAGE_SIZE`].
    pub limit: u32,
    pub category: CategoryFilter,
    pub sort_by: SortBy,
    pub search: Option<String>,
}

impl Default for NoteListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            category: CategoryFilter::Any,
            sort_by: SortBy::UpdatedAt,
            search: None,
        }
    }
}

impl NoteListQuery {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// Result of flipping a note's pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinToggle {
    pub is_pinned: bool,
}
