//! Integration tests for the dashboard aggregates.
//!
//! Verifies that owner-scoped counters ignore other owners' rows, that node
//! counters skip deleted nodes, and that running tasks list `processing`
//! issues newest first with their node.

use chrono::{Duration, Utc};
use issuefleet_core::status::{NodeStatus, Priority};
use issuefleet_core::types::DbId;
use issuefleet_db::models::issue::CreateIssue;
use issuefleet_db::models::node::CreateNode;
use issuefleet_db::models::project::CreateProject;
use issuefleet_db::models::prompt::CreatePrompt;
use issuefleet_db::repositories::{DashboardRepo, IssueRepo, NodeRepo, ProjectRepo, PromptRepo};
use sqlx::PgPool;

const OWNER: DbId = 1;
const STRANGER: DbId = 2;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn create_issue(pool: &PgPool, owner_id: DbId, title: &str) -> DbId {
    let input = CreateIssue {
        title: title.to_string(),
        description: None,
        repository_url: None,
        issue_number: None,
        priority: Some(Priority::Medium),
        project_id: None,
        dependency_issue_ids: None,
        status: None,
        assigned_node_id: None,
    };
    IssueRepo::create(pool, owner_id, &input, &[]).await.unwrap().id
}

async fn live_node(pool: &PgPool, name: &str) -> DbId {
    let node = NodeRepo::create(
        pool,
        &CreateNode {
            name: name.to_string(),
            ip: "10.0.0.5".to_string(),
            description: None,
            tags: None,
        },
    )
    .await
    .unwrap();
    NodeRepo::heartbeat(pool, node.id, NodeStatus::Idle, Utc::now())
        .await
        .unwrap();
    node.id
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn empty_database_reports_zeroes(pool: PgPool) {
    let stats = DashboardRepo::stats(&pool, OWNER).await.unwrap();
    assert_eq!(stats.issues.total, 0);
    assert_eq!(stats.nodes.total, 0);
    assert_eq!(stats.projects_count, 0);
    assert!(stats.running_tasks.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn issue_and_config_counts_belong_to_the_owner(pool: PgPool) {
    let claimed = create_issue(&pool, OWNER, "claimed").await;
    create_issue(&pool, OWNER, "waiting").await;
    create_issue(&pool, STRANGER, "not mine").await;
    let node = live_node(&pool, "worker-1").await;
    IssueRepo::claim(&pool, claimed, node, Duration::seconds(90))
        .await
        .unwrap();

    let project = CreateProject {
        name: "Widgets".to_string(),
        description: None,
        repository_urls: None,
    };
    ProjectRepo::create(&pool, OWNER, &project, &[]).await.unwrap();
    ProjectRepo::create(&pool, STRANGER, &project, &[]).await.unwrap();
    let prompt = CreatePrompt {
        name: "Triage".to_string(),
        content: "Fix it".to_string(),
        tags: None,
    };
    PromptRepo::create(&pool, STRANGER, &prompt).await.unwrap();

    let stats = DashboardRepo::stats(&pool, OWNER).await.unwrap();
    assert_eq!(stats.issues.total, 2);
    assert_eq!(stats.issues.pending, 1);
    assert_eq!(stats.issues.processing, 1);
    assert_eq!(stats.projects_count, 1);
    assert_eq!(stats.prompts_count, 0);
    assert_eq!(stats.credentials_count, 0);

    let stranger = DashboardRepo::stats(&pool, STRANGER).await.unwrap();
    assert_eq!(stranger.issues.total, 1);
    assert_eq!(stranger.prompts_count, 1);
    assert!(stranger.running_tasks.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn node_counts_skip_deleted_nodes(pool: PgPool) {
    let busy = live_node(&pool, "worker-1").await;
    live_node(&pool, "worker-2").await;
    let gone = live_node(&pool, "worker-3").await;
    NodeRepo::create(
        &pool,
        &CreateNode {
            name: "never-seen".to_string(),
            ip: "10.0.0.9".to_string(),
            description: None,
            tags: None,
        },
    )
    .await
    .unwrap();
    NodeRepo::soft_delete(&pool, gone).await.unwrap();
    let issue = create_issue(&pool, OWNER, "work").await;
    IssueRepo::claim(&pool, issue, busy, Duration::seconds(90))
        .await
        .unwrap();

    let nodes = DashboardRepo::node_counts(&pool).await.unwrap();
    assert_eq!(nodes.running, 1);
    assert_eq!(nodes.idle, 1);
    assert_eq!(nodes.offline, 1);
    assert_eq!(nodes.total, 3);
}

// ---------------------------------------------------------------------------
// Running tasks
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn running_tasks_are_newest_first_with_node_names(pool: PgPool) {
    let first = create_issue(&pool, OWNER, "first").await;
    let second = create_issue(&pool, OWNER, "second").await;
    let node_a = live_node(&pool, "worker-a").await;
    let node_b = live_node(&pool, "worker-b").await;
    IssueRepo::claim(&pool, first, node_a, Duration::seconds(90))
        .await
        .unwrap();
    IssueRepo::claim(&pool, second, node_b, Duration::seconds(90))
        .await
        .unwrap();
    sqlx::query("UPDATE issues SET started_at = NOW() - INTERVAL '5 minutes' WHERE id = $1")
        .bind(first)
        .execute(&pool)
        .await
        .unwrap();

    let tasks = DashboardRepo::running_tasks(&pool, OWNER, 10).await.unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].issue_id, second);
    assert_eq!(tasks[0].node_name, "worker-b");
    assert_eq!(tasks[1].issue_id, first);
    assert_eq!(tasks[1].node_id, node_a);
    assert_eq!(tasks[1].issue_title, "first");
    assert!(tasks[1].running_secs >= 300);

    let limited = DashboardRepo::running_tasks(&pool, OWNER, 1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].issue_id, second);
}
