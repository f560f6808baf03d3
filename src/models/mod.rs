//! Domain models for notekeep.
//!
//! # Core Concepts
//!
//! - [`Note`]: an HTML note owned by exactly one user, addressed by its slug in
//!   most routes. Pinned notes are listed separately from the paginated list.
//! - [`Category`]: a user-defined label with a display theme. Notes and
//!   categories are linked many-to-many through the `note_categories` table.
//! - [`User`] and [`AuthSession`]: the account a request acts on behalf of and
//!   the bearer token that proves it.
//!
//! Everything is serialized in camelCase because the JSON API is consumed by a
//! browser client.

mod category;
mod note;
mod user;

pub use category::*;
pub use note::*;
pub use user::*;

use serde::{Deserialize, Serialize};
use validator::ValidationError;

/// Pagination block returned alongside the main notes list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    /// Effective page size after capping.
    pub limit: u32,
    pub total_pages: u64,
}

impl PageMeta {
    pub fn new(total: u64, page: u32, limit: u32) -> Self {
        Self {
            total,
            page,
            limit,
            total_pages: total.div_ceil(u64::from(limit.max(1))),
        }
    }

    pub fn empty(page: u32, limit: u32) -> Self {
        Self::new(0, page, limit)
    }
}

/// One page of notes plus its pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotePage {
    pub notes: Vec<NoteWithCategories>,
    pub meta: PageMeta,
}

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_CATEGORY_NAME_CHARS: usize = 50;
pub const MAX_USER_NAME_CHARS: usize = 100;

/// Non-blank and at most `max` characters once surrounding whitespace is
/// trimmed, which is how the value is stored.
fn trimmed_length(value: &str, max: usize) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("blank").with_message("must not be blank".into()));
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::new("length")
            .with_message(format!("must be at most {max} characters").into()));
    }
    Ok(())
}

pub(crate) fn validate_title(value: &str) -> Result<(), ValidationError> {
    trimmed_length(value, MAX_TITLE_CHARS)
}

pub(crate) fn validate_category_name(value: &str) -> Result<(), ValidationError> {
    trimmed_length(value, MAX_CATEGORY_NAME_CHARS)
}

pub(crate) fn validate_user_name(value: &str) -> Result<(), ValidationError> {
    trimmed_length(value, MAX_USER_NAME_CHARS)
}

pub(crate) fn validate_ids(ids: &[i64]) -> Result<(), ValidationError> {
    if ids.iter().any(|id| *id <= 0) {
        return Err(ValidationError::new("id").with_message("ids must be positive integers".into()));
    }
    Ok(())
}
