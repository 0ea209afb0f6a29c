use crate::error::AppError;
use crate::ingestion::RawLocationUpdate;
use crate::models::RetrieveQuery;
use crate::retrieval::parse_count;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// `GET /submit?lat=..&lon=..&timestamp=..&hdop=..&altitude=..&speed=..`
///
/// Persisting and caching run on the blocking pool. The closure runs to
/// completion even if the client goes away, so a stored update always
/// reaches the cache too.
pub async fn submit(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<StatusCode, AppError> {
    let raw = RawLocationUpdate::from_pairs(pairs);
    let ingestor = Arc::clone(&state.ingestor);
    tokio::task::spawn_blocking(move || ingestor.ingest(&raw)).await??;

    Ok(StatusCode::NO_CONTENT)
}

/// `GET /retrieve?count=N`
///
/// Query strings are taken as plain pairs so that a repeated key cannot fail
/// the request; the first value wins.
pub async fn retrieve(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let query = RetrieveQuery::from_pairs(pairs);
    let count = parse_count(query.count.as_deref());

    let retriever = Arc::clone(&state.retriever);
    let entries = tokio::task::spawn_blocking(move || retriever.retrieve(count)).await??;

    let body = serde_json::to_vec(&entries)?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}
