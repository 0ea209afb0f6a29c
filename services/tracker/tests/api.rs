use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use persistence::{EntryStore, JournalConfig, JournalStore, StoreError};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use tracker::parse::ParsePolicy;
use tracker::{create_router, AppState, ServiceSettings};
use types::location::Entry;

fn app_with(policy: ParsePolicy) -> (TempDir, Router) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(JournalStore::open(JournalConfig::new(dir.path())).unwrap());
    let settings = ServiceSettings {
        parse_policy: policy,
        ..ServiceSettings::default()
    };
    let state = AppState::new(store, settings).unwrap();
    (dir, create_router(state, None))
}

fn app() -> (TempDir, Router) {
    app_with(ParsePolicy::Lenient)
}

async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn retrieve(app: &Router, uri: &str) -> Vec<Entry> {
    let response = get(app, uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn submit_uri(ts: u64) -> String {
    format!("/submit?lat=52.5&lon=13.4&timestamp={ts}&hdop=0.9&altitude=34&speed=1.5")
}

#[tokio::test]
async fn test_submit_then_retrieve_latest() {
    let (_dir, app) = app();

    let response = get(&app, &submit_uri(1_700_000_000)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(response).await.is_empty());

    let entries = retrieve(&app, "/retrieve").await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].timestamp, 1_700_000_000);
    assert_eq!(entries[0].data.latitude, 52.5);
    assert_eq!(entries[0].data.longitude, 13.4);
    assert_eq!(entries[0].data.hdop, 0.9);
    assert_eq!(entries[0].data.altitude, 34.0);
    assert_eq!(entries[0].data.speed, 1.5);
}

#[tokio::test]
async fn test_retrieve_count_semantics() {
    let (_dir, app) = app();
    for ts in [100, 200, 300] {
        assert_eq!(get(&app, &submit_uri(ts)).await.status(), StatusCode::NO_CONTENT);
    }

    let zero = retrieve(&app, "/retrieve?count=0").await;
    assert_eq!(zero.len(), 1);
    assert_eq!(zero[0].timestamp, 300);

    let one = retrieve(&app, "/retrieve?count=1").await;
    assert_eq!(one, zero);

    let five = retrieve(&app, "/retrieve?count=5").await;
    let timestamps: Vec<u64> = five.iter().map(|e| e.timestamp).collect();
    assert_eq!(timestamps, vec![300, 200, 100]);

    let two = retrieve(&app, "/retrieve?count=2").await;
    assert_eq!(two.len(), 2);
    assert_eq!(two[0].timestamp, 300);
}

#[tokio::test]
async fn test_unparsable_count_means_one() {
    let (_dir, app) = app();
    for ts in [1, 2, 3] {
        get(&app, &submit_uri(ts)).await;
    }

    assert_eq!(retrieve(&app, "/retrieve?count=lots").await.len(), 1);
    assert_eq!(retrieve(&app, "/retrieve?count=-2").await.len(), 1);
    assert_eq!(retrieve(&app, "/retrieve?count=99999").await.len(), 1);
}

#[tokio::test]
async fn test_empty_store_serves_zero_entry() {
    let (_dir, app) = app();

    let entries = retrieve(&app, "/retrieve?count=1").await;
    assert_eq!(entries, vec![Entry::default()]);

    let entries = retrieve(&app, "/retrieve?count=10").await;
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_lenient_malformed_field_becomes_zero() {
    let (_dir, app) = app();

    let response = get(&app, "/submit?lat=1&lon=2&timestamp=42&hdop=1&altitude=1&speed=abc").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let entries = retrieve(&app, "/retrieve?count=2").await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].timestamp, 42);
    assert_eq!(entries[0].data.speed, 0.0);
    assert_eq!(entries[0].data.latitude, 1.0);
}

#[tokio::test]
async fn test_missing_fields_default_to_zero() {
    let (_dir, app) = app_with(ParsePolicy::Strict);

    let response = get(&app, "/submit?lat=10").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let entries = retrieve(&app, "/retrieve").await;
    assert_eq!(entries[0].timestamp, 0);
    assert_eq!(entries[0].data.latitude, 10.0);
    assert_eq!(entries[0].data.speed, 0.0);
}

#[tokio::test]
async fn test_strict_rejects_malformed_field() {
    let (_dir, app) = app_with(ParsePolicy::Strict);

    let response = get(&app, "/submit?lat=1&lon=2&timestamp=42&speed=abc").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["error"], "BAD_REQUEST");
    assert!(body["message"].as_str().unwrap().contains("speed"));

    let entries = retrieve(&app, "/retrieve?count=5").await;
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_server_header_on_every_response() {
    let (_dir, app) = app();

    let submit = submit_uri(1);
    for uri in ["/retrieve", "/stats", "/", submit.as_str()] {
        let response = get(&app, uri).await;
        let server = response.headers().get(header::SERVER).unwrap().to_str().unwrap();
        assert!(server.starts_with("tracker/"), "{uri}: {server}");
        assert!(server.contains(" on "));
    }
}

#[tokio::test]
async fn test_root_without_web_root_is_not_implemented() {
    let (_dir, app) = app();

    let response = get(&app, "/").await;
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(body_bytes(response).await, b"Sorry, / is not implemented.");
}

#[tokio::test]
async fn test_static_assets_served_from_web_root() {
    let data = TempDir::new().unwrap();
    let web = TempDir::new().unwrap();
    std::fs::write(web.path().join("index.html"), "<h1>map</h1>").unwrap();

    let store = Arc::new(JournalStore::open(JournalConfig::new(data.path())).unwrap());
    let state = AppState::new(store, ServiceSettings::default()).unwrap();
    let app = create_router(state, Some(web.path().to_path_buf()));

    let response = get(&app, "/index.html").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"<h1>map</h1>");

    // API routes still win over the asset directory
    assert_eq!(get(&app, "/retrieve").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cors_is_permissive() {
    let (_dir, app) = app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/retrieve")
                .header(header::ORIGIN, "https://example.org")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_stats_reports_counters() {
    let (_dir, app) = app_with(ParsePolicy::Strict);

    get(&app, &submit_uri(5)).await;
    get(&app, "/submit?lat=nope").await;
    retrieve(&app, "/retrieve").await;

    let response = get(&app, "/stats").await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();

    assert_eq!(stats["parse_policy"], "strict");
    assert_eq!(stats["metrics"]["updates_accepted"], 1);
    assert_eq!(stats["metrics"]["updates_rejected"], 1);
    assert_eq!(stats["metrics"]["cache_reads"], 1);
    assert_eq!(stats["latest"]["timestamp"], 5);
    assert!(stats["recovery"].is_null());
}

#[tokio::test]
async fn test_repeated_query_keys_use_first_value() {
    let (_dir, app) = app();

    let response = get(&app, "/submit?lat=1&lat=2&timestamp=5").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = get(&app, "/submit?lat=3&timestamp=6&timestamp=7").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let entries = retrieve(&app, "/retrieve?count=2&count=3").await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].timestamp, 6);
    assert_eq!(entries[1].timestamp, 5);
    assert_eq!(entries[1].data.latitude, 1.0);

    let entries = retrieve(&app, "/retrieve?count=1&count=5").await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].timestamp, 6);
}

#[tokio::test]
async fn test_repeated_keys_still_follow_strict_policy() {
    let (_dir, app) = app_with(ParsePolicy::Strict);

    let response = get(&app, "/submit?speed=fast&speed=1&timestamp=1").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["error"], "BAD_REQUEST");
}

/// Store that refuses every write.
struct ReadOnlyStore;

impl EntryStore for ReadOnlyStore {
    fn append(&self, _entry: &Entry) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        )))
    }

    fn read_recent(&self, _limit: usize) -> Result<Vec<Entry>, StoreError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_store_failure_is_500_and_cache_unchanged() {
    let state = AppState::new(Arc::new(ReadOnlyStore), ServiceSettings::default()).unwrap();
    let app = create_router(state, None);

    let response = get(&app, &submit_uri(7)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["error"], "PERSISTENCE_ERROR");

    let entries = retrieve(&app, "/retrieve").await;
    assert_eq!(entries, vec![Entry::default()]);
}
