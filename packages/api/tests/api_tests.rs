// ABOUTME: Router-level tests for the versioned REST API
// ABOUTME: Drives the axum router with oneshot requests over an in-memory database

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use benos_api::create_api_router;
use benos_core::Actor;
use benos_projects::DbState;
use benos_security::AgentCreateInput;
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn setup() -> (Router, DbState) {
    let pool = benos_storage::memory_pool().await.unwrap();
    let db = DbState::new(pool);
    let app = Router::new()
        .nest("/api/v1", create_api_router())
        .with_state(db.clone());
    (app, db)
}

async fn send_request(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    send_request(app, request).await
}

async fn create(app: &Router, uri: &str, body: Value) -> Value {
    let (status, response) = send(app, Method::POST, uri, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", response);
    response["data"].clone()
}

/// Area, project, and board ids for a fresh hierarchy
async fn hierarchy(app: &Router) -> (String, String, String) {
    let area = create(app, "/api/v1/areas", json!({"name": "Work"})).await;
    let project = create(
        app,
        "/api/v1/projects",
        json!({"areaId": area["id"], "name": "Launch"}),
    )
    .await;
    let board = create(
        app,
        "/api/v1/boards",
        json!({"projectId": project["id"], "name": "Sprint 1"}),
    )
    .await;
    (
        area["id"].as_str().unwrap().to_string(),
        project["id"].as_str().unwrap().to_string(),
        board["id"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_area_crud_envelope() {
    let (app, _) = setup().await;
    let area = create(&app, "/api/v1/areas", json!({"name": "Work", "color": "#ff8800"})).await;
    assert_eq!(area["position"], 0);
    assert_eq!(area["color"], "#ff8800");

    let uri = format!("/api/v1/areas/{}", area["id"].as_str().unwrap());
    let (status, body) = send(&app, Method::PUT, &uri, Some(json!({"color": null}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["color"], Value::Null);

    let (status, body) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], true);

    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn test_bad_inputs_are_400() {
    let (app, _) = setup().await;

    let (status, body) = send(&app, Method::GET, "/api/v1/projects/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = send(&app, Method::POST, "/api/v1/areas", Some(json!({"name": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/projects",
        Some(json!({"areaId": "5f0c8a4e-7c1b-4a57-9a55-2f3b0c1d9e77", "name": "Orphan"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/api/v1/projects?status=paused", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/areas",
        Some(json!({"description": "no name"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_project_listing_is_paginated() {
    let (app, _) = setup().await;
    let area = create(&app, "/api/v1/areas", json!({"name": "Work"})).await;
    for i in 0..3 {
        create(
            &app,
            "/api/v1/projects",
            json!({"areaId": area["id"], "name": format!("P{}", i)}),
        )
        .await;
    }

    let uri = format!(
        "/api/v1/projects?area_id={}&page=2&limit=2",
        area["id"].as_str().unwrap()
    );
    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["items"].as_array().unwrap().len(), 1);
    assert_eq!(data["items"][0]["name"], "P2");
    assert_eq!(data["pagination"]["totalItems"], 3);
    assert_eq!(data["pagination"]["hasNextPage"], false);
    assert_eq!(data["pagination"]["hasPreviousPage"], true);
}

#[tokio::test]
async fn test_task_workflow_routes() {
    let (app, _) = setup().await;
    let (_, project_id, board_id) = hierarchy(&app).await;

    let task = create(
        &app,
        "/api/v1/tasks",
        json!({"boardId": board_id, "title": "Write launch post", "priority": "high"}),
    )
    .await;
    let task_id = task["id"].as_str().unwrap().to_string();
    assert_eq!(task["columnId"], "todo");
    assert_eq!(task["status"], "todo");

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/tasks/{}/status", task_id),
        Some(json!({"status": "in_progress"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["columnId"], "in_progress");

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/tasks/{}/move", task_id),
        Some(json!({"columnId": "done"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "done");
    assert!(body["data"]["completedAt"].is_string());

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/tasks/{}/move", task_id),
        Some(json!({"columnId": "nowhere"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let uri = format!("/api/v1/tasks?project_id={}&q=launch", project_id);
    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["totalItems"], 1);

    let (status, body) = send(&app, Method::GET, &format!("/api/v1/boards/{}", board_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let columns = body["data"]["columnTasks"].as_array().unwrap();
    assert_eq!(columns.len(), 4);
    assert_eq!(columns[3]["id"], "done");
    assert_eq!(columns[3]["tasks"][0]["id"], task_id.as_str());
}

#[tokio::test]
async fn test_bulk_reports_per_id_failures() {
    let (app, _) = setup().await;
    let (_, _, board_id) = hierarchy(&app).await;
    let a = create(&app, "/api/v1/tasks", json!({"boardId": board_id, "title": "A"})).await;
    let b = create(&app, "/api/v1/tasks", json!({"boardId": board_id, "title": "B"})).await;
    let missing = "0b9d4a8e-1f3c-4e2b-8a7d-6c5b4a3f2e1d";

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/tasks/bulk",
        Some(json!({
            "taskIds": [a["id"], b["id"], missing],
            "action": "update",
            "changes": {"priority": "urgent"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["succeeded"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["failed"][0]["id"], missing);
}

#[tokio::test]
async fn test_subtasks_under_missing_task_are_404() {
    let (app, _) = setup().await;
    let uri = "/api/v1/tasks/0b9d4a8e-1f3c-4e2b-8a7d-6c5b4a3f2e1d/subtasks";
    let (status, _) = send(&app, Method::GET, uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::POST, uri, Some(json!({"title": "x"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_subtask_routes() {
    let (app, _) = setup().await;
    let (_, _, board_id) = hierarchy(&app).await;
    let task = create(&app, "/api/v1/tasks", json!({"boardId": board_id, "title": "Ship"})).await;
    let base = format!("/api/v1/tasks/{}/subtasks", task["id"].as_str().unwrap());

    let first = create(&app, &base, json!({"title": "Draft"})).await;
    let second = create(&app, &base, json!({"title": "Review"})).await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("{}/reorder", base),
        Some(json!({"orderedIds": [second["id"], first["id"]]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["title"], "Review");

    let toggle = format!("/api/v1/subtasks/{}/toggle", first["id"].as_str().unwrap());
    let (status, body) = send(&app, Method::POST, &toggle, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["completed"], true);
}

#[tokio::test]
async fn test_prd_upload_extract_and_restore() {
    let (app, _) = setup().await;
    let (_, project_id, board_id) = hierarchy(&app).await;

    let prd = create(
        &app,
        "/api/v1/prds/upload",
        json!({
            "projectId": project_id,
            "filename": "habit-tracker.md",
            "content": "# Habit Tracker\n\n## Features\n\n- Create a habit\n- Mark a habit done\n"
        }),
    )
    .await;
    assert_eq!(prd["title"], "Habit Tracker");
    let prd_uri = format!("/api/v1/prds/{}", prd["id"].as_str().unwrap());

    let extracted = create(
        &app,
        &format!("{}/extract-tasks", prd_uri),
        json!({"boardId": board_id}),
    )
    .await;
    assert_eq!(extracted["created"].as_array().unwrap().len(), 2);

    let (status, _) = send(
        &app,
        Method::PUT,
        &prd_uri,
        Some(json!({"content": "# Habit Tracker\n\nRewritten."})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, versions) = send(&app, Method::GET, &format!("{}/versions", prd_uri), None).await;
    assert_eq!(versions["data"][0]["version"], 1);

    let (status, restored) = send(
        &app,
        Method::POST,
        &format!("{}/versions/1/restore", prd_uri),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(restored["data"]["version"], 3);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("{}/versions/0/restore", prd_uri),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, sections) = send(&app, Method::GET, &format!("{}/sections", prd_uri), None).await;
    assert_eq!(sections["data"]["title"], "Habit Tracker");
}

#[tokio::test]
async fn test_generate_and_list_reports() {
    let (app, _) = setup().await;
    let (_, project_id, board_id) = hierarchy(&app).await;
    create(
        &app,
        "/api/v1/tasks",
        json!({"boardId": board_id, "title": "Done already", "status": "done"}),
    )
    .await;

    let report = create(
        &app,
        "/api/v1/reports",
        json!({"reportType": "weekly", "projectId": project_id}),
    )
    .await;
    assert_eq!(report["content"]["totals"]["completed"], 1);
    assert!(!report["insights"].as_array().unwrap().is_empty());

    let (status, body) = send(&app, Method::GET, "/api/v1/reports?report_type=weekly", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/reports",
        Some(json!({"reportType": "project"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_agent_routes_never_leak_hash() {
    let (app, db) = setup().await;
    let created_agent = create(
        &app,
        "/api/v1/agents",
        json!({"name": "Planner", "capabilities": ["tasks:*", "boards:read"]}),
    )
    .await;
    assert!(created_agent["apiKey"].as_str().unwrap().starts_with("benos_"));
    assert!(created_agent.get("keyHash").is_none());

    let (status, _) = send(&app, Method::GET, "/api/v1/agents/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let agent = db
        .agent_storage
        .create(
            AgentCreateInput {
                name: "Reporter".to_string(),
                description: None,
                capabilities: vec!["reports:read".to_string()],
            },
            &Actor::local_user(),
        )
        .await
        .unwrap()
        .agent;
    let request = Request::builder()
        .uri("/api/v1/agents/me")
        .extension(agent.clone())
        .body(Body::empty())
        .unwrap();
    let (status, body) = send_request(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Reporter");

    let rotate = format!("/api/v1/agents/{}/rotate-key", agent.id);
    let (status, body) = send(&app, Method::POST, &rotate, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["apiKey"].is_string());

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/agents",
        Some(json!({"name": "Bad", "capabilities": ["tasks:fly"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_mutations_attributed_to_request_actor() {
    let (app, db) = setup().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/areas")
        .header("content-type", "application/json")
        .extension(Actor::agent("agent-7", "Planner"))
        .body(Body::from(json!({"name": "Ops"}).to_string()))
        .unwrap();
    let (status, body) = send_request(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    let area_id = body["data"]["id"].as_str().unwrap().to_string();

    db.flush_activity().await;
    let uri = format!("/api/v1/activity?entity_type=area&entity_id={}", area_id);
    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let entry = &body["data"][0];
    assert_eq!(entry["action"], "created");
    assert_eq!(entry["actorType"], "agent");
    assert_eq!(entry["actorId"], "agent-7");
}
