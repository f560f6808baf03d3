use axum::{extract::State, http::StatusCode, Json};

use crate::api::{ApiError, ApiResponse, ApiResult, AppState, AuthUser, ValidatedJson};
use crate::models::*;
use crate::password::{hash_password, verify_password};

/// Same answer for an unknown email and a wrong password.
const BAD_CREDENTIALS: &str = "Invalid email or password";

/// Run an Argon2 hash or verify on the blocking pool.
async fn off_runtime<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password task failed: {e}")))
}

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<RegisterInput>,
) -> ApiResult<(StatusCode, Json<ApiResponse<AuthPayload>>)> {
    let RegisterInput {
        name,
        email,
        password,
    } = input;
    let hash = off_runtime(move || hash_password(&password))
        .await?
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {e}")))?;
    let user = state.db.create_user(&email, &name, &hash)?;
    let session = state.db.create_auth_session(user.id, state.session_ttl)?;

    tracing::info!(user_id = user.id, "registered user");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(AuthPayload {
            token: session.token,
            user,
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<LoginInput>,
) -> ApiResult<Json<ApiResponse<AuthPayload>>> {
    let Some((user, hash)) = state.db.find_credentials(&input.email)? else {
        tracing::warn!("Login attempt for unknown email");
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS.into()));
    };

    let password = input.password;
    let matches = off_runtime(move || verify_password(&password, &hash))
        .await?
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored hash unusable: {e}")))?;
    if !matches {
        tracing::warn!(user_id = user.id, "Login attempt with wrong password");
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS.into()));
    }

    let session = state.db.create_auth_session(user.id, state.session_ttl)?;
    Ok(Json(ApiResponse::ok(AuthPayload {
        token: session.token,
        user,
    })))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<()>>> {
    state.db.delete_auth_session(&auth.token)?;
    Ok(Json(ApiResponse::message("Logged out successfully")))
}

pub async fn me(auth: AuthUser) -> Json<ApiResponse<User>> {
    Json(ApiResponse::ok(auth.user))
}
