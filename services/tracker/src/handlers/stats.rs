use crate::models::StatsResponse;
use crate::router::server_header_value;
use crate::state::AppState;
use axum::{extract::State, Json};

pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        server: server_header_value(),
        parse_policy: state.ingestor.policy(),
        max_count: state.retriever.max_count(),
        latest: state.cache.get(),
        metrics: state.metrics.snapshot(),
        recovery: state.recovery.as_deref().cloned(),
    })
}
