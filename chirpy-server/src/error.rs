//! HTTP error rendering
//!
//! Every failure becomes `{"error": "<message>"}` with the status of its
//! [`ErrorKind`]. Internal detail goes to the log, never to the client.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::response::{IntoResponse, Response};
use chirpy_core::{AuthError, ErrorKind};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("JSON body rejected: {0}")]
    Json(#[from] JsonRejection),

    #[error("path rejected: {0}")]
    Path(#[from] PathRejection),

    #[error("query rejected: {0}")]
    Query(#[from] QueryRejection),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(err) => err.kind(),
            Self::Json(_) | Self::Path(_) | Self::Query(_) => ErrorKind::MalformedRequest,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Auth(err) => err.public_message(),
            Self::Json(_) => "Something went wrong decoding the request".to_string(),
            Self::Path(_) | Self::Query(_) => ErrorKind::MalformedRequest.default_message().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        if kind == ErrorKind::UpstreamFailure {
            error!(error = %self, "Request failed");
        } else {
            debug!(error = %self, kind = ?kind, "Request rejected");
        }
        (kind.status_code(), Json(json!({ "error": self.public_message() }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
