use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chirpy_core::Credentials;

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::ApiResult;

/// Register without opening a session
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(credentials) = payload?;
    let profile = state.sessions.create_user(credentials).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Replace the caller's email and password
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(credentials) = payload?;
    let profile = state.sessions.update_credentials(user_id, credentials).await?;
    Ok(Json(profile))
}
