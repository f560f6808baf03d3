pub mod auth;
pub mod categories;
pub mod notes;

use axum::{response::IntoResponse, Json};

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
