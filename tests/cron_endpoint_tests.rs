/// HTTP-level tests for the cron trigger, driven through the real router with
/// an in-memory reminder store.
mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tower::ServiceExt;

use common::*;
use mokhtar_reminders::db_storage::ShopStorage;
use mokhtar_reminders::handlers::AppState;
use mokhtar_reminders::models::DebtStatus;
use mokhtar_reminders::router::{build_router, CRON_REMINDERS_PATH};

struct Harness {
    app: Router,
    store: Arc<InMemoryStore>,
    sender: Arc<FakeSender>,
}

fn harness(cron_secret: Option<&str>, store: InMemoryStore) -> Harness {
    let store = Arc::new(store);
    let sender = Arc::new(FakeSender::default());

    // CRUD storage is never touched by these tests; the pool connects lazily.
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/unused")
        .unwrap();

    let state = Arc::new(AppState {
        storage: ShopStorage::new(pool),
        config: test_config(cron_secret),
        reminders: runner(store.clone(), sender.clone(), Arc::new(FakeNotifier::default())),
    });

    Harness {
        app: build_router(state).unwrap(),
        store,
        sender,
    }
}

fn one_due_debt() -> InMemoryStore {
    // Due long ago so it is selected whatever the wall-clock date is.
    InMemoryStore::with_records(vec![debt_record(
        Some("Ali"),
        Some("03158798"),
        "2020-01-01",
        DebtStatus::Overdue,
        None,
    )])
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_missing_secret_is_rejected_before_store_access() {
    let h = harness(Some("s3cret"), one_due_debt());

    let (status, body) = call(h.app, get(CRON_REMINDERS_PATH)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, serde_json::json!({ "ok": false, "error": "Unauthorized" }));
    assert_eq!(h.store.sweep_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.store.read_calls.load(Ordering::SeqCst), 0);
    assert!(h.sender.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_wrong_header_secret_is_rejected() {
    let h = harness(Some("s3cret"), one_due_debt());
    let request = Request::builder()
        .uri(CRON_REMINDERS_PATH)
        .header("x-cron-secret", "guess")
        .body(Body::empty())
        .unwrap();

    let (status, _) = call(h.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_trusted_scheduler_header_runs_job() {
    let h = harness(Some("s3cret"), one_due_debt());
    let request = Request::builder()
        .uri(CRON_REMINDERS_PATH)
        .header("x-vercel-cron", "1")
        .body(Body::empty())
        .unwrap();

    let (status, body) = call(h.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["found"], 1);
    assert_eq!(body["sent"], 1);
    assert_eq!(body["failures"], serde_json::json!([]));
    assert!(body["today"].is_string());
    assert_eq!(h.sender.recipients(), vec!["9613158798".to_string()]);
}

#[tokio::test]
async fn test_query_secret_runs_job() {
    let h = harness(Some("s3cret"), one_due_debt());

    let (status, body) = call(h.app, get(&format!("{}?secret=s3cret", CRON_REMINDERS_PATH))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sent"], 1);
}

#[tokio::test]
async fn test_no_secret_configured_accepts_any_caller() {
    let h = harness(None, InMemoryStore::default());

    let (status, body) = call(h.app, get(CRON_REMINDERS_PATH)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["found"], 0);
    assert_eq!(body["sent"], 0);
}

#[tokio::test]
async fn test_failed_debt_is_listed_with_id() {
    let store = InMemoryStore::with_records(vec![debt_record(
        Some("Ali"),
        Some("03158798"),
        "2020-01-01",
        DebtStatus::Overdue,
        None,
    )]);
    let failing_id = store.records.lock().unwrap()[0].debt.id;
    let h = harness(None, InMemoryStore {
        fail_writes_for: vec![failing_id],
        ..store
    });

    let (status, body) = call(h.app, get(CRON_REMINDERS_PATH)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sent"], 0);
    assert_eq!(body["failures"][0]["id"], failing_id.to_string());
    assert!(body["failures"][0]["err"].is_string());
}

#[tokio::test]
async fn test_store_read_failure_is_reported_in_body() {
    let h = harness(
        None,
        InMemoryStore {
            fail_reads: true,
            ..one_due_debt()
        },
    );

    let (status, body) = call(h.app, get(CRON_REMINDERS_PATH)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        serde_json::json!({ "ok": false, "error": "Reminder selection failed" })
    );
    assert!(h.sender.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_health_is_open() {
    let h = harness(Some("s3cret"), InMemoryStore::default());

    let (status, body) = call(h.app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "mokhtar-reminders");
}
