use crate::context::ToolContext;
use crate::tests::test_helpers::{call, create_test_context, seed_area};
use benos_core::Actor;
use benos_projects::DbState;
use benos_security::AgentCreateInput;
use benos_tasks::BoardCreateInput;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{json, Value};
use std::time::Duration;

/// Area, project, and a default-column board, returned as (project_id, board_id)
async fn seed_board(context: &ToolContext) -> (String, String) {
    let area_id = seed_area(context.db(), "Work").await;
    let (is_error, project) = call(
        context,
        "create_project",
        json!({"areaId": area_id, "name": "Launch", "priority": "high"}),
    )
    .await;
    assert!(!is_error, "{}", project);
    let project_id = project["id"].as_str().unwrap().to_string();

    let board = context
        .db()
        .board_storage
        .create(
            BoardCreateInput {
                project_id: project_id.clone(),
                name: "Sprint".to_string(),
                description: None,
                columns: None,
            },
            &Actor::local_user(),
        )
        .await
        .unwrap();
    (project_id, board.id)
}

async fn issue_key(db: &DbState, name: &str, capabilities: &[&str]) -> (String, String) {
    let created = db
        .agent_storage
        .create(
            AgentCreateInput {
                name: name.to_string(),
                description: None,
                capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
            },
            &Actor::local_user(),
        )
        .await
        .unwrap();
    (created.agent.id, created.api_key)
}

async fn wait_for_activity(context: &ToolContext, filter: Value) -> Vec<Value> {
    for _ in 0..50 {
        let (is_error, entries) = call(context, "list_activity", filter.clone()).await;
        assert!(!is_error, "{}", entries);
        let entries = entries.as_array().unwrap().clone();
        if !entries.is_empty() {
            return entries;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no activity recorded");
}

#[tokio::test]
async fn test_task_lifecycle_on_a_board() {
    let context = create_test_context().await;
    let (_, board_id) = seed_board(&context).await;

    let (is_error, task) = call(
        &context,
        "create_task",
        json!({"boardId": board_id, "title": "Write launch post", "priority": "urgent"}),
    )
    .await;
    assert!(!is_error, "{}", task);
    assert_eq!(task["columnId"], "todo");
    assert_eq!(task["status"], "todo");
    let task_id = task["id"].as_str().unwrap().to_string();

    let (_, moved) = call(&context, "move_task", json!({"id": task_id, "columnId": "done"})).await;
    assert_eq!(moved["status"], "done");
    assert!(moved["completedAt"].is_string());

    let (_, reopened) = call(
        &context,
        "update_task_status",
        json!({"id": task_id, "status": "in_progress"}),
    )
    .await;
    assert_eq!(reopened["columnId"], "in_progress");
    assert!(reopened["completedAt"].is_null());

    let (_, board) = call(&context, "get_board", json!({"id": board_id})).await;
    let columns = board["columnTasks"].as_array().unwrap();
    assert_eq!(columns.len(), 4);
    let in_progress = columns.iter().find(|c| c["id"] == "in_progress").unwrap();
    assert_eq!(in_progress["tasks"][0]["id"], task_id.as_str());
}

#[tokio::test]
async fn test_update_and_assign_task() {
    let context = create_test_context().await;
    let (_, board_id) = seed_board(&context).await;
    let (agent_id, _) = issue_key(context.db(), "Writer", &["tasks:*"]).await;

    let (_, task) = call(&context, "create_task", json!({"boardId": board_id, "title": "Draft"})).await;
    let task_id = task["id"].as_str().unwrap().to_string();

    let (is_error, updated) = call(
        &context,
        "update_task",
        json!({"id": task_id, "title": "Final draft", "tags": ["copy"]}),
    )
    .await;
    assert!(!is_error, "{}", updated);
    assert_eq!(updated["title"], "Final draft");

    let (_, assigned) = call(&context, "assign_task", json!({"id": task_id, "agentId": agent_id})).await;
    assert_eq!(assigned["assignedAgentId"], agent_id.as_str());

    let (_, unassigned) = call(&context, "assign_task", json!({"id": task_id, "agentId": null})).await;
    assert!(unassigned["assignedAgentId"].is_null());
}

#[tokio::test]
async fn test_list_and_search_tasks() {
    let context = create_test_context().await;
    let (project_id, board_id) = seed_board(&context).await;
    for title in ["Fix login bug", "Write docs", "Fix signup bug"] {
        call(&context, "create_task", json!({"boardId": board_id, "title": title})).await;
    }

    let (_, listed) = call(&context, "list_tasks", json!({"project_id": project_id})).await;
    assert_eq!(listed["total"], 3);

    let (is_error, found) = call(&context, "search_tasks", json!({"query": "bug"})).await;
    assert!(!is_error, "{}", found);
    assert_eq!(found["total"], 2);

    let (is_error, body) = call(&context, "search_tasks", json!({"query": "   "})).await;
    assert!(is_error);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_subtasks() {
    let context = create_test_context().await;
    let (_, board_id) = seed_board(&context).await;
    let (_, task) = call(&context, "create_task", json!({"boardId": board_id, "title": "Release"})).await;

    let (is_error, subtask) = call(
        &context,
        "create_subtask",
        json!({"taskId": task["id"], "title": "Tag version"}),
    )
    .await;
    assert!(!is_error, "{}", subtask);
    assert_eq!(subtask["completed"], false);

    let (_, done) = call(&context, "complete_subtask", json!({"id": subtask["id"]})).await;
    assert_eq!(done["completed"], true);
    assert!(done["completedAt"].is_string());
}

#[tokio::test]
async fn test_prds_and_projects() {
    let context = create_test_context().await;
    let (project_id, _) = seed_board(&context).await;

    let (is_error, prd) = call(
        &context,
        "create_prd",
        json!({"projectId": project_id, "title": "Launch PRD", "content": "# Goals\n- Ship"}),
    )
    .await;
    assert!(!is_error, "{}", prd);
    assert_eq!(prd["version"], 1);

    let (_, fetched) = call(&context, "get_prd", json!({"id": prd["id"]})).await;
    assert_eq!(fetched["title"], "Launch PRD");

    let (_, prds) = call(&context, "list_prds", json!({"project_id": project_id})).await;
    assert_eq!(prds.as_array().unwrap().len(), 1);

    let (_, project) = call(&context, "get_project", json!({"id": project_id})).await;
    assert_eq!(project["name"], "Launch");

    let (_, projects) = call(&context, "list_projects", json!({"page": 1, "limit": 10})).await;
    assert_eq!(projects["items"].as_array().unwrap().len(), 1);

    let (_, areas) = call(&context, "list_areas", json!({})).await;
    assert_eq!(areas[0]["name"], "Work");
}

#[tokio::test]
async fn test_generate_weekly_report() {
    let context = create_test_context().await;
    let (_, board_id) = seed_board(&context).await;
    call(&context, "create_task", json!({"boardId": board_id, "title": "Ship"})).await;

    let (is_error, report) = call(&context, "generate_report", json!({"reportType": "weekly"})).await;
    assert!(!is_error, "{}", report);
    assert_eq!(report["reportType"], "weekly");
    assert!(report["title"].as_str().unwrap().starts_with("Weekly"));
}

#[tokio::test]
async fn test_agent_key_attributes_activity() {
    let base = create_test_context().await;
    let (_, board_id) = seed_board(&base).await;
    let (agent_id, key) = issue_key(base.db(), "Planner", &["tasks:*", "activity:read"]).await;

    let context = ToolContext::with_agent_key(base.db().clone(), &key).await.unwrap();
    let (is_error, task) = call(&context, "create_task", json!({"boardId": board_id, "title": "Plan"})).await;
    assert!(!is_error, "{}", task);

    let entries = wait_for_activity(&context, json!({"actor_id": agent_id})).await;
    assert!(entries
        .iter()
        .any(|entry| entry["entityId"] == task["id"] && entry["actorType"] == "agent"));
}

#[tokio::test]
async fn test_agent_capabilities_are_enforced() {
    let base = create_test_context().await;
    let (_, key) = issue_key(base.db(), "Reader", &["tasks:read"]).await;
    let context = ToolContext::with_agent_key(base.db().clone(), &key).await.unwrap();

    let (is_error, _) = call(&context, "list_tasks", json!({})).await;
    assert!(!is_error);

    let (is_error, body) = call(&context, "list_areas", json!({})).await;
    assert!(is_error);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_unknown_or_revoked_key_is_rejected() {
    let base = create_test_context().await;
    assert!(ToolContext::with_agent_key(base.db().clone(), "benos_not_a_key").await.is_err());
}

#[rstest]
#[case::unknown_tool("drop_database", json!({}), "UNKNOWN_TOOL")]
#[case::malformed_id("get_task", json!({"id": "not-a-uuid"}), "VALIDATION_ERROR")]
#[case::missing_task("get_task", json!({"id": "6f1c1c1e-9d3b-4c1a-8f3e-2b6f1a2c3d4e"}), "NOT_FOUND")]
#[case::missing_board("create_task", json!({"title": "No board"}), "VALIDATION_ERROR")]
#[case::bad_status("list_tasks", json!({"status": "someday"}), "VALIDATION_ERROR")]
#[tokio::test]
async fn test_tool_errors(#[case] tool: &str, #[case] arguments: Value, #[case] code: &str) {
    let context = create_test_context().await;
    let (is_error, body) = call(&context, tool, arguments).await;
    assert!(is_error);
    assert_eq!(body["error"]["code"], code);
}

#[test]
fn test_activity_from_each_session_is_kept() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("benos.db");

    let area_id = {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let db = DbState::init_with_path(Some(path.clone())).await.unwrap();
            let area_id = seed_area(&db, "Work").await;
            db.flush_activity().await;
            area_id
        })
    };

    // Each session ends the way the binary does: flush, then the runtime goes away
    for i in 0..6 {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let db = DbState::init_with_path(Some(path.clone())).await.unwrap();
            let context = ToolContext::new(db);
            let (is_error, project) = call(
                &context,
                "create_project",
                json!({"areaId": area_id, "name": format!("Project {}", i)}),
            )
            .await;
            assert!(!is_error, "{}", project);
            context.db().flush_activity().await;
        });
    }

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (projects, created): (i64, usize) = runtime.block_on(async {
        let db = DbState::init_with_path(Some(path.clone())).await.unwrap();
        let projects = db
            .project_storage
            .list(&Default::default(), None)
            .await
            .unwrap()
            .1;
        let created = db
            .activity_storage()
            .list(&benos_storage::ActivityFilter {
                entity_type: Some(benos_storage::EntityType::Project),
                limit: Some(100),
                ..Default::default()
            })
            .await
            .unwrap()
            .len();
        (projects, created)
    });
    assert_eq!(projects, 6);
    assert_eq!(created, 6);
}
