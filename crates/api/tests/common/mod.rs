#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::NaiveDate;
use http_body_util::BodyExt;
use linewatch_collector::MemoryTransport;
use linewatch_core::parser::TIMESTAMP_FORMAT;
use linewatch_core::LineConfig;
use linewatch_events::SnapshotHub;
use linewatch_poller::{Poller, PollerConfig};
use tower::ServiceExt;

use linewatch_api::app::build_app;
use linewatch_api::config::ServerConfig;
use linewatch_api::state::AppState;
use linewatch_api::ws::WsManager;

/// Two processes: a three-press parallel stage and a single welder.
pub const LINE_CONFIG: &str = r#"{
    "line_id": "L1",
    "display_name": "Line 1",
    "equipment": [
        { "id": "p1", "endpoint": "http://p1/log", "display_name": "Press 1" },
        { "id": "p2", "endpoint": "http://p2/log", "display_name": "Press 2" },
        { "id": "p3", "endpoint": "http://p3/log", "display_name": "Press 3" },
        { "id": "w1", "endpoint": "http://w1/log", "display_name": "Welder" }
    ],
    "processes": [
        { "name": "press", "display_name": "Pressing",
          "equipment_ids": ["p1", "p2", "p3"], "topology": "PARALLEL",
          "design_time_seconds": 30.0 },
        { "name": "weld", "display_name": "Welding",
          "equipment_ids": ["w1"], "topology": "SEQUENTIAL",
          "design_time_seconds": 45.0 }
    ]
}"#;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: [127, 0, 0, 1].into(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        line_config_path: PathBuf::from("config/line.json"),
    }
}

/// Poller settings with fast retries and no auto start.
pub fn test_poller_config() -> PollerConfig {
    PollerConfig {
        fetch_retries: 1,
        retry_backoff: Duration::from_millis(1),
        auto_start: false,
        ..PollerConfig::default()
    }
}

/// `count` paired cycles of `seconds` each, one unit every 100 s.
pub fn paired_log(equipment: &str, count: i64, seconds: i64) -> String {
    let base = NaiveDate::from_ymd_opt(2025, 3, 14)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();
    (0..count)
        .flat_map(|i| {
            let start = base + chrono::Duration::seconds(i * 100);
            let end = start + chrono::Duration::seconds(seconds);
            [
                format!(
                    "{equipment}-{i},L1,PN,proc,{equipment},REQUEST,{}",
                    start.format(TIMESTAMP_FORMAT)
                ),
                format!(
                    "{equipment}-{i},L1,PN,proc,{equipment},COMPLETE_OK,{}",
                    end.format(TIMESTAMP_FORMAT)
                ),
            ]
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// In-memory transport answering every configured endpoint.
pub fn healthy_transport() -> Arc<MemoryTransport> {
    let transport = Arc::new(MemoryTransport::new());
    transport.respond("http://p1/log", paired_log("p1", 3, 28));
    transport.respond("http://p2/log", paired_log("p2", 3, 30));
    transport.respond("http://p3/log", paired_log("p3", 3, 32));
    transport.respond("http://w1/log", paired_log("w1", 3, 45));
    transport
}

/// Build the full application router over the given transport.
///
/// Uses the same [`build_app`] as the binary so integration tests exercise
/// the production middleware stack.
pub fn build_test_app_with(transport: Arc<MemoryTransport>) -> (Router, AppState) {
    let poller = Poller::new(
        LineConfig::from_json_str(LINE_CONFIG).unwrap(),
        transport,
        Arc::new(SnapshotHub::new()),
        test_poller_config(),
    );
    let state = AppState {
        config: Arc::new(test_config()),
        poller,
        ws_manager: Arc::new(WsManager::new()),
    };
    (build_app(state.clone()), state)
}

pub fn build_test_app() -> (Router, AppState, Arc<MemoryTransport>) {
    let transport = healthy_transport();
    let (app, state) = build_test_app_with(transport.clone());
    (app, state, transport)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
