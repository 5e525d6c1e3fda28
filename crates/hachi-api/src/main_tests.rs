//! Router tests against a fresh database.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use hachi_core::{Config, Database};

use super::{AppState, app};

fn temp_db_path() -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    let filename = format!("hachi-api-test-{}.db", Uuid::new_v4());
    path.push(filename);
    path
}

async fn state() -> AppState {
    let db = Database::open(&temp_db_path()).await.expect("open db");
    AppState {
        config: Arc::new(Config::default()),
        db: Arc::new(db),
    }
}

async fn send(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app(state.clone()).oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

#[tokio::test]
async fn health_is_ok() {
    let state = state().await;
    let (status, body) = send(&state, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn day_task_flow() {
    let state = state().await;

    let (status, task) = send(
        &state,
        "POST",
        "/day/w_001/2025-09-13/add",
        Some(json!({"text": "  post reel  "})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(task["text"], "post reel");
    let id = task["id"].as_str().expect("id").to_string();

    let (status, _) = send(
        &state,
        "POST",
        &format!("/day/w_001/2025-09-13/{id}/toggle"),
        Some(json!({"done": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, view) = send(&state, "GET", "/day/w_001/2025-09-13/tasks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["tasks"][0]["done"], true);

    let (status, body) = send(&state, "POST", "/day/w_001/2025-09-13/clear_done", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cleared"], 1);

    let (status, body) = send(&state, "DELETE", &format!("/day/w_001/2025-09-13/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().expect("detail").starts_with("Not found"));
}

#[tokio::test]
async fn malformed_ids_are_not_found() {
    let state = state().await;

    let (status, body) = send(&state, "DELETE", "/day/w_001/2025-09-01/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().expect("detail").starts_with("Not found"));

    let (status, _) = send(
        &state,
        "POST",
        "/day/w_001/2025-09-01/not-a-uuid/toggle",
        Some(json!({"done": true})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &state,
        "DELETE",
        "/references/not-a-uuid?workspace_id=w_001",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn empty_task_text_is_unprocessable() {
    let state = state().await;
    let (status, body) = send(
        &state,
        "POST",
        "/day/w_001/2025-09-13/add",
        Some(json!({"text": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn bad_date_and_period_are_unprocessable() {
    let state = state().await;
    let (status, _) = send(&state, "GET", "/day/w_001/13-09-2025/tasks", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(&state, "GET", "/day/w_001/month/2025-13", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn today_initializes_plan() {
    let state = state().await;
    let (status, view) = send(&state, "GET", "/day/today/w_001", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["workspace_id"], "w_001");
    assert!(view["tasks"].as_array().expect("tasks").is_empty());
}

#[tokio::test]
async fn negative_goal_target_is_unprocessable() {
    let state = state().await;
    send(
        &state,
        "POST",
        "/kpis",
        Some(json!({"id": "k_reach", "name": "Reach", "channel": "Instagram"})),
    )
    .await;

    let (status, body) = send(
        &state,
        "PUT",
        "/goals",
        Some(json!({"kpi_id": "k_reach", "period": "2025-09", "target_value": -5.0})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn integration_status_and_disconnect() {
    let state = state().await;

    let (status, body) = send(
        &state,
        "GET",
        "/integrations/youtube/status?workspace_id=w_001",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connected"], false);
    assert_eq!(body["last_metric_date"], Value::Null);

    let (status, body) = send(
        &state,
        "DELETE",
        "/integrations/instagram/disconnect?workspace_id=w_001",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["was_connected"], false);

    let (status, _) = send(
        &state,
        "GET",
        "/integrations/myspace/status?workspace_id=w_001",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn kpi_goal_metric_progress_flow() {
    let state = state().await;

    let kpi = json!({"id": "k_reach", "name": "Reach", "channel": "Instagram"});
    let (status, created) = send(&state, "POST", "/kpis", Some(kpi.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["aggregation"], "sum");
    assert_eq!(created["unit"], "count");

    let (status, _) = send(&state, "POST", "/kpis", Some(kpi)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let goal = json!({"kpi_id": "k_reach", "period": "2025-09", "target_value": 200.0});
    let (status, _) = send(&state, "POST", "/goals", Some(goal.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&state, "POST", "/goals", Some(goal)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    for (date, value) in [("2025-09-01", 10.0), ("2025-09-02", 40.0)] {
        let (status, _) = send(
            &state,
            "POST",
            "/metrics",
            Some(json!({"kpi_id": "k_reach", "date": date, "value": value})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, card) = send(&state, "GET", "/metrics/progress/k_reach/2025-09", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(card["actual"], 50.0);
    assert_eq!(card["pct_of_target"], 25.0);

    let (status, series) = send(&state, "GET", "/metrics/series/k_reach/2025-09", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(series.as_array().expect("series").len(), 2);

    let (status, _) = send(&state, "GET", "/metrics/progress/k_missing/2025-09", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn workspace_report_and_preview() {
    let state = state().await;

    let (status, _) = send(
        &state,
        "POST",
        "/workspaces",
        Some(json!({"id": "w_001", "name": "Bakery"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    send(
        &state,
        "POST",
        "/kpis",
        Some(json!({"id": "k_orders", "name": "Orders", "channel": "Shop"})),
    )
    .await;
    let (status, _) = send(
        &state,
        "POST",
        "/workspaces/w_001/attach_kpi",
        Some(json!({"kpi_id": "k_orders"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &state,
        "POST",
        "/wins",
        Some(json!({"workspace_id": "w_001", "date": "2025-09-05", "title": "First wholesale order"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, cards) = send(
        &state,
        "GET",
        "/metrics/progress/workspace/w_001/2025-09",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cards[0]["kpi_id"], "k_orders");
    assert_eq!(cards[0]["pct_of_target"], Value::Null);

    let (status, preview) = send(
        &state,
        "POST",
        "/reports/preview",
        Some(json!({"workspace_id": "w_001", "period": "2025-09", "limit_wins": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["workspace"]["name"], "Bakery");
    assert_eq!(preview["highlights"][0]["title"], "First wholesale order");
    assert_eq!(preview["notes"], "");

    let (status, _) = send(
        &state,
        "GET",
        "/metrics/progress/workspace/w_ghost/2025-09",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reference_endpoints() {
    let state = state().await;

    let (status, tags) = send(&state, "GET", "/references/tags", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(tags.as_array().expect("tags").iter().any(|t| t == "steal-this"));

    let (status, _) = send(
        &state,
        "POST",
        "/references",
        Some(json!({"workspace_id": "w_001", "url": "nope"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, reference) = send(
        &state,
        "POST",
        "/references",
        Some(json!({"workspace_id": "w_001", "url": "https://youtu.be/xyz"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reference["platform"], "youtube");
    let id = reference["id"].as_str().expect("id").to_string();

    let (status, updated) = send(
        &state,
        "PUT",
        &format!("/references/{id}"),
        Some(json!({"workspace_id": "w_001", "tags": ["Reel", "reel"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["tags"], json!(["reel"]));

    let (status, listed) = send(&state, "GET", "/references?workspace_id=w_001", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().expect("list").len(), 1);

    let (status, _) = send(
        &state,
        "DELETE",
        &format!("/references/{id}?workspace_id=w_001"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
