use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use podcast_console::clients::webhook::{ScriptWorkflow, WebhookClient};
use podcast_console::config::{Config, StoreBackend};
use podcast_console::db::MemoryStore;
use podcast_console::models::episode::EpisodeRecord;
use podcast_console::state::SharedState;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "console-test-boundary";

fn record(id: i64, name: &str, created_at: &str) -> EpisodeRecord {
    let mut record = EpisodeRecord::new(id, name);
    record.created_at = Some(created_at.to_string());
    record
}

async fn spawn_app(store: MemoryStore) -> (Router, Arc<SharedState>) {
    let mut config = Config::default();
    config.store.backend = StoreBackend::Memory;
    config.observability.metrics_enabled = false;

    let workflow: Arc<dyn ScriptWorkflow> =
        Arc::new(WebhookClient::new(&config.webhook).expect("webhook client"));
    let shared = Arc::new(SharedState::with_components(
        config,
        Arc::new(store),
        workflow,
    ));
    shared
        .console
        .load_records()
        .await
        .expect("initial load");

    let state = podcast_console::api::create_app_state(shared.clone(), None);
    (podcast_console::api::router(state).await, shared)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn with_json(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn multipart(name: &str, file: Option<(&str, &str, &[u8])>) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"episodeName\"\r\n\r\n{name}\r\n"
        )
        .as_bytes(),
    );
    if let Some((file_name, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"pdfFile\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/submissions")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_list_orders_columns_and_rows() {
    let store = MemoryStore::with_rows(vec![
        record(1, "Pilot", "2026-01-02T10:00:00Z"),
        record(2, "Finale", "2026-03-01T10:00:00Z"),
    ]);
    let (app, _) = spawn_app(store).await;

    let (status, json) = send(&app, get("/api/records")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let columns = json["data"]["columns"].as_array().unwrap();
    assert_eq!(columns[0], "id");
    assert_eq!(json["data"]["rows"].as_array().unwrap().len(), 2);
    assert_eq!(json["data"]["sort"]["direction"], "none");

    let (_, json) = send(
        &app,
        with_json("POST", "/api/records/sort", &json!({ "column": "created_at" })),
    )
    .await;
    assert_eq!(json["data"]["sort"]["direction"], "ascending");
    assert_eq!(json["data"]["rows"][0]["episode_name"], "Pilot");

    let (_, json) = send(
        &app,
        with_json("POST", "/api/records/sort", &json!({ "column": "created_at" })),
    )
    .await;
    assert_eq!(json["data"]["sort"]["direction"], "descending");
    assert_eq!(json["data"]["rows"][0]["episode_name"], "Finale");
}

#[tokio::test]
async fn test_sort_rejects_blank_column() {
    let (app, _) = spawn_app(MemoryStore::new()).await;
    let (status, json) = send(
        &app,
        with_json("POST", "/api/records/sort", &json!({ "column": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_edit_and_save_record() {
    let store = MemoryStore::with_rows(vec![record(7, "Pilot", "2026-01-02T10:00:00Z")]);
    let (app, _) = spawn_app(store.clone()).await;

    let (status, json) = send(&app, empty("POST", "/api/records/7/edit")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["episode_name"], "Pilot");

    let mut edited = json["data"].clone();
    edited["episode_title"] = json!("The Pilot");
    let (status, json) = send(&app, with_json("PUT", "/api/records/7", &edited)).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["episode_title"], "The Pilot");

    let stored = store.get(&"7".into()).await.unwrap();
    assert_eq!(stored.episode_title.as_deref(), Some("The Pilot"));

    let (_, json) = send(&app, get("/api/records")).await;
    assert!(json["data"]["editing"].is_null());
}

#[tokio::test]
async fn test_save_without_edit_is_conflict() {
    let store = MemoryStore::with_rows(vec![record(7, "Pilot", "2026-01-02T10:00:00Z")]);
    let (app, _) = spawn_app(store).await;

    let (status, _) = send(
        &app,
        with_json("PUT", "/api/records/7", &json!({ "id": 7, "episode_name": "X" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_delete_requires_confirmation() {
    let store = MemoryStore::with_rows(vec![record(3, "Pilot", "2026-01-02T10:00:00Z")]);
    let (app, _) = spawn_app(store.clone()).await;

    let (status, _) = send(&app, empty("DELETE", "/api/records/3")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(store.get(&"3".into()).await.is_some());

    let (status, _) = send(&app, empty("DELETE", "/api/records/3?confirm=true")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(store.get(&"3".into()).await.is_none());

    let (status, _) = send(&app, empty("DELETE", "/api/records/3?confirm=true")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_select_shows_record_read_only() {
    let mut pilot = record(5, "Pilot", "2026-01-02T10:00:00Z");
    pilot.interview_script_1 = Some("https://files/1".to_string());
    let (app, _) = spawn_app(MemoryStore::with_rows(vec![pilot])).await;

    let (status, json) = send(&app, empty("POST", "/api/records/5/select")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["viewing"], true);
    assert_eq!(json["data"]["inputs_enabled"], false);
    assert_eq!(json["data"]["episode_name"], "Pilot");
    assert_eq!(json["data"]["can_approve"], false);

    // Second click on the same row clears the selection.
    let (_, json) = send(&app, empty("POST", "/api/records/5/select")).await;
    assert_eq!(json["data"]["viewing"], false);
    assert_eq!(json["data"]["inputs_enabled"], true);
    assert!(json["data"]["links"].is_null());
}

#[tokio::test]
async fn test_submission_field_errors() {
    let (app, _) = spawn_app(MemoryStore::new()).await;

    let (status, json) = send(&app, multipart("", Some(("a.pdf", "application/pdf", b"%PDF")))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["field"], "episodeName");

    let (status, json) = send(&app, multipart("Pilot", None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["field"], "pdfFile");

    let (status, json) = send(
        &app,
        multipart("Pilot", Some(("notes.txt", "text/plain", b"hello"))),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["field"], "pdfFile");
}

#[tokio::test]
async fn test_submission_for_existing_name_resolves_immediately() {
    let mut pilot = record(9, "Pilot", "2026-01-02T10:00:00Z");
    pilot.interview_script_4 = Some("https://files/4".to_string());
    let (app, shared) = spawn_app(MemoryStore::with_rows(vec![pilot])).await;

    let (status, json) = send(
        &app,
        multipart("Pilot", Some(("pilot.pdf", "application/pdf", b"%PDF-1.7"))),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED, "{json}");
    assert_eq!(json["data"]["phase"]["state"], "submitted");

    shared.console.wait_for_submission().await;

    let (_, json) = send(&app, get("/api/submissions/current")).await;
    assert_eq!(json["data"]["phase"]["state"], "resolved");
    assert_eq!(json["data"]["phase"]["outcome"], "already_existed");
    assert_eq!(json["data"]["can_approve"], true);
}

#[tokio::test]
async fn test_approval_flow() {
    let mut pilot = record(4, "Pilot", "2026-01-02T10:00:00Z");
    pilot.interview_script_1 = Some("https://files/1".to_string());
    pilot.interview_script_4 = Some("https://files/4".to_string());
    let store = MemoryStore::with_rows(vec![pilot]);
    let (app, _) = spawn_app(store.clone()).await;

    let (status, _) = send(&app, empty("POST", "/api/approval/confirm")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    send(&app, empty("POST", "/api/records/4/select")).await;

    let (status, json) = send(&app, empty("POST", "/api/approval")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["dialog_open"], true);

    let (status, json) = send(&app, empty("POST", "/api/approval/confirm")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["confirmed"], true);
    assert_eq!(json["data"]["persisted"], true);
    assert_eq!(json["data"]["form"]["script_status"], "Approved");
    assert_eq!(json["data"]["form"]["can_approve"], false);

    let stored = store.get(&"4".into()).await.unwrap();
    assert_eq!(
        stored.script_status,
        Some(podcast_console::domain::ScriptStatus::Approved)
    );
}

#[tokio::test]
async fn test_status_reports_backend() {
    let (app, _) = spawn_app(MemoryStore::with_rows(vec![record(
        1,
        "Pilot",
        "2026-01-02T10:00:00Z",
    )]))
    .await;

    let (status, json) = send(&app, get("/api/system/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["store_backend"], "memory");
    assert_eq!(json["data"]["records_loaded"], 1);
    assert_eq!(json["data"]["webhook_configured"], false);
}

#[tokio::test]
async fn test_index_served_for_unknown_paths() {
    let (app, _) = spawn_app(MemoryStore::new()).await;
    let response = app.clone().oneshot(get("/some/client/route")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));
    assert!(response.headers().contains_key("content-security-policy"));
}

#[tokio::test]
async fn test_event_stream_asks_slow_clients_to_resync() {
    use podcast_console::domain::events::{ConsoleEvent, NotificationLevel};

    let (app, shared) = spawn_app(MemoryStore::with_rows(vec![record(
        1,
        "Pilot",
        "2026-01-02T10:00:00Z",
    )]))
    .await;

    let response = app.clone().oneshot(get("/api/events")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/event-stream"));

    // Overflow the bus before the client reads anything.
    for i in 0..300 {
        let _ = shared
            .event_bus
            .send(ConsoleEvent::notify(NotificationLevel::Info, format!("event {i}")));
    }

    let mut body = response.into_body();
    let frame = body.frame().await.unwrap().unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.contains("event: resync"), "unexpected frame: {text}");
    assert!(text.contains("\"missed\":"));
    assert!(text.contains("\"records\":1"));
}
