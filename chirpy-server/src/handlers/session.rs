//! Signup, login, refresh, revoke and logout
//!
//! Token delivery goes through the deployment's single [`SessionTransport`]:
//! the bearer variant answers with tokens in the JSON body, the cookie
//! variant with `Set-Cookie` headers and a body that carries no tokens.
//!
//! [`SessionTransport`]: chirpy_core::SessionTransport

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chirpy_core::{Credentials, SessionGrant, UserProfile};
use serde::Serialize;
use serde_json::json;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub user: UserProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

fn session_response(
    state: &AppState,
    status: StatusCode,
    grant: SessionGrant,
) -> ApiResult<(StatusCode, HeaderMap, Json<SessionResponse>)> {
    let mut headers = HeaderMap::new();
    let body_tokens = state.transport.deliver_session(&grant.tokens, &mut headers)?;
    let (token, refresh_token) = match body_tokens {
        Some(tokens) => (Some(tokens.access_token), Some(tokens.refresh_token)),
        None => (None, None),
    };
    Ok((
        status,
        headers,
        Json(SessionResponse {
            user: grant.user,
            token,
            refresh_token,
        }),
    ))
}

pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(credentials) = payload?;
    let grant = state.sessions.signup(credentials).await?;
    session_response(&state, StatusCode::CREATED, grant)
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(credentials) = payload?;
    let grant = state.sessions.login(credentials).await?;
    session_response(&state, StatusCode::OK, grant)
}

/// New access token from the presented refresh token; the refresh token
/// stays as it is
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    let refresh_token = state.transport.refresh_token(&headers)?;
    let access_token = state.sessions.refresh(&refresh_token).await?;

    let mut out = HeaderMap::new();
    let response = match state.transport.deliver_access(&access_token, &mut out)? {
        Some(token) => (StatusCode::OK, out, Json(json!({ "token": token }))).into_response(),
        None => (StatusCode::OK, out).into_response(),
    };
    Ok(response)
}

/// Revoke the presented refresh token. Client-held session state is
/// cleared whether or not the server-side revoke succeeds.
pub async fn revoke(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, (HeaderMap, ApiError)> {
    let mut out = HeaderMap::new();
    state.transport.clear_session(&mut out);

    let revoked = match state.transport.refresh_token(&headers) {
        Ok(token) => state.sessions.revoke(&token).await,
        Err(e) => Err(e),
    };
    match revoked {
        Ok(()) => Ok((StatusCode::NO_CONTENT, out).into_response()),
        Err(e) => Err((out, e.into())),
    }
}
