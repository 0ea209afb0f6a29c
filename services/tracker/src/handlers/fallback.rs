use axum::{
    http::{header, StatusCode, Uri},
    response::IntoResponse,
};

/// Served at `/` when there is no web root to serve static assets from.
pub async fn not_implemented(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_IMPLEMENTED,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("Sorry, {} is not implemented.", uri.path()),
    )
}
