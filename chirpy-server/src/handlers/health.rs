use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;

/// Readiness probe
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, [(CONTENT_TYPE, "text/plain; charset=utf-8")], "OK")
}
