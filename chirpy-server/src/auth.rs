//! `CurrentUser` extractor for protected routes

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

/// Caller identity proven by a valid access token
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = state.gate.authenticate(&parts.headers)?;
        parts.extensions.insert(user);
        Ok(Self(user.id()))
    }
}
