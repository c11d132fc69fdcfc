//! HTTP-level integration tests for `/dashboard/stats`.

mod common;

use axum::http::{Method, StatusCode};
use common::{as_owner, body_json, create_issue, get, live_node, post};
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_stats_on_empty_fleet(pool: PgPool) {
    let response = get(common::build_test_app(pool), "/api/v1/dashboard/stats").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["issues"]["total"], 0);
    assert_eq!(json["data"]["nodes"]["total"], 0);
    assert_eq!(json["data"]["running_tasks"], json!([]));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_stats_count_claimed_work_and_running_node(pool: PgPool) {
    let node = live_node(&pool, "gpu-01").await;
    live_node(&pool, "gpu-02").await;
    let id = create_issue(&pool, json!({"title": "Fix login"})).await;
    create_issue(&pool, json!({"title": "Later"})).await;
    let response = post(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/issues/{id}/process?node_id={node}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(common::build_test_app(pool), "/api/v1/dashboard/stats").await;
    assert_eq!(response.status(), StatusCode::OK);
    let data = body_json(response).await["data"].clone();
    assert_eq!(data["issues"]["pending"], 1);
    assert_eq!(data["issues"]["processing"], 1);
    assert_eq!(data["issues"]["total"], 2);
    assert_eq!(data["nodes"]["running"], 1);
    assert_eq!(data["nodes"]["idle"], 1);

    let tasks = data["running_tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["issue_id"], id);
    assert_eq!(tasks[0]["issue_title"], "Fix login");
    assert_eq!(tasks[0]["node_name"], "gpu-01");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_stats_hide_other_owners_work(pool: PgPool) {
    let node = live_node(&pool, "gpu-01").await;
    let id = create_issue(&pool, json!({"title": "Owner one"})).await;
    let response = post(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/issues/{id}/process?node_id={node}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = as_owner(
        common::build_test_app(pool),
        Method::GET,
        "/api/v1/dashboard/stats",
        2,
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let data = body_json(response).await["data"].clone();
    assert_eq!(data["issues"]["total"], 0);
    assert_eq!(data["running_tasks"], json!([]));
    // Nodes are shared by every owner.
    assert_eq!(data["nodes"]["running"], 1);
}
