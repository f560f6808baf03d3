use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const DEFAULT_THEME: &str = "default";

/// A user-defined label that notes can be filed under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    /// Display colour token understood by the client, e.g. `"amber"`.
    pub theme: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

/// The slice of a category embedded in every note response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub id: i64,
    pub name: String,
    pub theme: String,
}

/// A category plus how many notes are filed under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWithCount {
    #[serde(flatten)]
    pub category: Category,
    pub note_count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryInput {
    #[validate(custom(function = "crate::models::validate_category_name"))]
    pub name: String,
    #[validate(length(min = 1, max = 32))]
    pub theme: Option<String>,
}

/// Input for updating a category. All fields are optional for partial updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryInput {
    #[validate(custom(function = "crate::models::validate_category_name"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub theme: Option<String>,
}
