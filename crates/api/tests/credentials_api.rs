//! HTTP-level integration tests for the `/credentials` resource.
//!
//! Secrets must never leave this resource unmasked, and each category's
//! required fields are enforced on create and on the merged update.

mod common;

use axum::http::{Method, StatusCode};
use common::{as_owner, body_json, delete, get, get_with_headers, live_node, post_json, put_json};
use serde_json::json;
use sqlx::PgPool;

async fn create_copilot(pool: &PgPool, node_ids: &[i64]) -> i64 {
    let response = post_json(
        common::build_test_app(pool.clone()),
        "/api/v1/credentials",
        json!({
            "title": "Copilot seat",
            "category": "github_copilot",
            "pat": "ghp_0000111122223456",
            "node_ids": node_ids
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_credential_masks_pat(pool: PgPool) {
    let node = live_node(&pool, "gpu-01").await;
    let response = post_json(
        common::build_test_app(pool),
        "/api/v1/credentials",
        json!({
            "title": "Copilot seat",
            "category": "github_copilot",
            "pat": "ghp_0000111122223456",
            "node_ids": [node, node]
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["category"], "github_copilot");
    assert_eq!(json["data"]["pat"], "****************3456");
    assert_eq!(json["data"]["node_ids"], json!([node]));
    assert_eq!(json["data"]["is_disabled"], false);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_and_get_are_masked(pool: PgPool) {
    let id = create_copilot(&pool, &[]).await;

    let response = get(common::build_test_app(pool.clone()), "/api/v1/credentials").await;
    let json = body_json(response).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["data"][0]["pat"], "****************3456");

    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/credentials/{id}"),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["pat"], "****************3456");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_is_scoped_to_owner(pool: PgPool) {
    create_copilot(&pool, &[]).await;

    let response = get_with_headers(
        common::build_test_app(pool),
        "/api/v1/credentials",
        &[("x-owner-id", "2")],
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["count"], 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_other_owner_cannot_get_update_or_delete(pool: PgPool) {
    let id = create_copilot(&pool, &[]).await;
    let uri = format!("/api/v1/credentials/{id}");
    let app = || common::build_test_app(pool.clone());

    let response = as_owner(app(), Method::GET, &uri, 2, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = as_owner(app(), Method::PUT, &uri, 2, Some(json!({"title": "Mine now"}))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = as_owner(app(), Method::DELETE, &uri, 2, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(app(), &uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["title"], "Copilot seat");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_pat_category_requires_pat(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        "/api/v1/credentials",
        json!({"title": "Empty", "category": "claude_code"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_generic_requires_username_password_service(pool: PgPool) {
    let response = post_json(
        common::build_test_app(pool.clone()),
        "/api/v1/credentials",
        json!({"title": "Registry", "category": "generic", "username": "bot"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(
        json["error"],
        "A generic credential requires password, service"
    );

    let response = post_json(
        common::build_test_app(pool),
        "/api/v1/credentials",
        json!({
            "title": "Registry",
            "category": "generic",
            "username": "bot",
            "password": "hunter22",
            "service": "registry.acme.dev"
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["username"], "bot");
    assert_eq!(json["data"]["password"], "****er22");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unknown_node_binding_rejected(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        "/api/v1/credentials",
        json!({
            "title": "Copilot seat",
            "category": "github_copilot",
            "pat": "ghp_0000111122223456",
            "node_ids": [999999]
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_replaces_bindings_and_validates_merged_secrets(pool: PgPool) {
    let a = live_node(&pool, "gpu-01").await;
    let b = live_node(&pool, "gpu-02").await;
    let id = create_copilot(&pool, &[a]).await;

    let response = put_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/credentials/{id}"),
        json!({"node_ids": [b], "is_disabled": true}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["node_ids"], json!([b]));
    assert_eq!(json["data"]["is_disabled"], true);

    // Switching to generic without the generic fields is rejected.
    let response = put_json(
        common::build_test_app(pool),
        &format!("/api/v1/credentials/{id}"),
        json!({"category": "generic"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_delete_credential(pool: PgPool) {
    let id = create_copilot(&pool, &[]).await;

    let response = delete(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/credentials/{id}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/credentials/{id}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
