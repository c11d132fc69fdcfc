//! Integration tests for projects and prompts.

use issuefleet_core::status::Priority;
use issuefleet_core::types::DbId;
use issuefleet_db::models::issue::CreateIssue;
use issuefleet_db::models::project::{CreateProject, UpdateProject};
use issuefleet_db::models::prompt::{CreatePrompt, UpdatePrompt};
use issuefleet_db::repositories::{IssueRepo, ProjectRepo, PromptRepo};
use sqlx::PgPool;

const OWNER: DbId = 1;

fn new_project(name: &str) -> CreateProject {
    CreateProject {
        name: name.to_string(),
        description: Some("backend services".to_string()),
        repository_urls: None,
    }
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn project_crud_round_trip(pool: PgPool) {
    let urls = vec!["https://github.com/acme/api".to_string()];
    let project = ProjectRepo::create(&pool, OWNER, &new_project("api"), &urls)
        .await
        .unwrap();
    assert_eq!(project.repository_urls, urls);

    let replaced = vec![
        "https://github.com/acme/api".to_string(),
        "https://github.com/acme/web".to_string(),
    ];
    let input = UpdateProject {
        name: Some("platform".to_string()),
        ..Default::default()
    };
    let updated = ProjectRepo::update(&pool, OWNER, project.id, &input, Some(&replaced))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.name, "platform");
    assert_eq!(updated.repository_urls, replaced);

    let untouched = ProjectRepo::update(&pool, OWNER, project.id, &UpdateProject::default(), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.repository_urls, replaced);

    // Other owners neither see nor touch the project.
    let stranger = OWNER + 1;
    assert_eq!(ProjectRepo::list(&pool, OWNER).await.unwrap().len(), 1);
    assert!(ProjectRepo::list(&pool, stranger).await.unwrap().is_empty());
    assert!(ProjectRepo::find_by_id(&pool, stranger, project.id)
        .await
        .unwrap()
        .is_none());
    assert!(ProjectRepo::update(&pool, stranger, project.id, &input, None)
        .await
        .unwrap()
        .is_none());
    assert!(!ProjectRepo::delete(&pool, stranger, project.id).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn deleting_project_detaches_issues(pool: PgPool) {
    let project = ProjectRepo::create(&pool, OWNER, &new_project("api"), &[])
        .await
        .unwrap();
    let input = CreateIssue {
        title: "Add pagination".to_string(),
        description: None,
        repository_url: None,
        issue_number: None,
        priority: Some(Priority::Low),
        project_id: Some(project.id),
        dependency_issue_ids: None,
        status: None,
        assigned_node_id: None,
    };
    let issue = IssueRepo::create(&pool, OWNER, &input, &[]).await.unwrap();
    assert_eq!(issue.project_id, Some(project.id));

    assert!(ProjectRepo::delete(&pool, OWNER, project.id).await.unwrap());
    let issue = IssueRepo::find_by_id(&pool, issue.id).await.unwrap().unwrap();
    assert!(issue.project_id.is_none());
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn prompt_crud_round_trip(pool: PgPool) {
    let prompt = PromptRepo::create(
        &pool,
        OWNER,
        &CreatePrompt {
            name: "bugfix".to_string(),
            content: "Fix the bug described below.".to_string(),
            tags: None,
        },
    )
    .await
    .unwrap();
    assert!(prompt.tags.is_empty());

    let input = UpdatePrompt {
        tags: Some(vec!["rust".to_string()]),
        ..Default::default()
    };
    let stranger = OWNER + 1;
    assert!(PromptRepo::update(&pool, stranger, prompt.id, &input)
        .await
        .unwrap()
        .is_none());
    assert!(!PromptRepo::delete(&pool, stranger, prompt.id).await.unwrap());

    let updated = PromptRepo::update(&pool, OWNER, prompt.id, &input)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.tags, vec!["rust".to_string()]);
    assert_eq!(updated.content, "Fix the bug described below.");

    assert!(PromptRepo::delete(&pool, OWNER, prompt.id).await.unwrap());
    assert!(PromptRepo::find_by_id(&pool, OWNER, prompt.id).await.unwrap().is_none());
}
