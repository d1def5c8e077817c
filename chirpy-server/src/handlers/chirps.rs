use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chirpy_core::AuthError;
use chirpy_core::chirp::SortOrder;
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
pub struct NewChirp {
    pub body: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
}

impl ListParams {
    fn author(&self) -> ApiResult<Option<Uuid>> {
        match self.author_id.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => Uuid::parse_str(raw)
                .map(Some)
                .map_err(|_| AuthError::MalformedRequest("Invalid author ID".into()).into()),
        }
    }

    fn order(&self) -> ApiResult<SortOrder> {
        Ok(self.sort.as_deref().unwrap_or_default().parse()?)
    }
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    payload: Result<Json<NewChirp>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(new) = payload?;
    let chirp = state.chirps.create(user_id, &new.body).await?;
    Ok((StatusCode::CREATED, Json(chirp)))
}

pub async fn list(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(params) = params?;
    let chirps = state.chirps.list(params.author()?, params.order()?).await?;
    Ok(Json(chirps))
}

pub async fn get(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id?;
    Ok(Json(state.chirps.get(id).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = id?;
    state.chirps.delete(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
