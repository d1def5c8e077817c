use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::warn;

use crate::AppState;
use crate::error::ApiResult;

/// Wipe all users, their tokens and chirps (dev platform only)
pub async fn reset(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    state.sessions.reset().await?;
    warn!("Store reset");
    Ok((StatusCode::OK, "Reset"))
}
