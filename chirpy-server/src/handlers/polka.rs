//! Payment provider webhook

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use chirpy_core::UpgradeEvent;
use chirpy_core::auth::transport::extract_api_key;

use crate::AppState;
use crate::error::ApiResult;

/// `Authorization: ApiKey <key>` is checked before the body is looked at.
/// Applied and ignored events both answer 204.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<UpgradeEvent>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let key = extract_api_key(&headers)?;
    state.sessions.verify_api_key(&key)?;

    let Json(event) = payload?;
    state.sessions.apply_upgrade_event(&event).await?;
    Ok(StatusCode::NO_CONTENT)
}
