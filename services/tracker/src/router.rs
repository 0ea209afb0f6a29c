use crate::handlers::{fallback, location, stats};
use crate::state::AppState;
use axum::{
    http::{header, HeaderValue},
    routing::get,
    Router,
};
use std::path::PathBuf;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// `Server` header value, e.g. `tracker/0.1.0 on linux x86_64`.
pub fn server_header_value() -> String {
    format!(
        "{}/{} on {} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

pub fn create_router(state: AppState, web_root: Option<PathBuf>) -> Router {
    let api_routes = Router::new()
        .route("/submit", get(location::submit))
        .route("/retrieve", get(location::retrieve))
        .route("/stats", get(stats::get_stats));

    let app = match web_root {
        Some(dir) => {
            tracing::info!(web_root = %dir.display(), "Serving static assets");
            api_routes.fallback_service(ServeDir::new(dir))
        }
        None => api_routes.route("/", get(fallback::not_implemented)),
    };

    let server = HeaderValue::from_str(&server_header_value())
        .unwrap_or_else(|_| HeaderValue::from_static(env!("CARGO_PKG_NAME")));

    app.layer(SetResponseHeaderLayer::overriding(header::SERVER, server))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
