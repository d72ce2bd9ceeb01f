// ABOUTME: HTTP request handlers for task operations
// ABOUTME: Search, CRUD, status changes, assignment, moves between columns, and bulk edits

use axum::{extract::State, response::Response};
use benos_core::{Priority, TaskStatus};
use benos_projects::{DbState, PaginatedResponse, PaginationParams};
use benos_security::{Access, Requirement, Resource};
use benos_tasks::{BulkAction, BulkInput, TaskCreateInput, TaskFilter, TaskMoveInput, TaskUpdateInput};
use serde::Deserialize;
use tracing::info;

use crate::extract::{ApiJson, ApiQuery, CurrentActor, EntityId, MaybeAgent};
use crate::response::{created, ok, ApiResult, Deleted};

/// Query string accepted by `GET /tasks`
#[derive(Debug, Default, Deserialize)]
pub struct TaskListQuery {
    pub board_id: Option<String>,
    pub project_id: Option<String>,
    pub column_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub assigned_agent_id: Option<String>,
    pub milestone_id: Option<String>,
    pub prd_id: Option<String>,
    pub q: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// List tasks matching the filters, one page at a time
pub async fn list_tasks(
    State(db): State<DbState>,
    ApiQuery(query): ApiQuery<TaskListQuery>,
) -> ApiResult<Response> {
    let pagination = PaginationParams {
        page: query.page,
        limit: query.limit,
    };
    info!("Listing tasks (page: {})", pagination.page());

    let filter = TaskFilter {
        board_id: query.board_id,
        project_id: query.project_id,
        column_id: query.column_id,
        status: query.status,
        priority: query.priority,
        assigned_agent_id: query.assigned_agent_id,
        milestone_id: query.milestone_id,
        prd_id: query.prd_id,
        q: query.q,
        limit: Some(pagination.limit()),
        offset: Some(pagination.offset()),
    };
    let (tasks, total) = db.task_storage.search(&filter).await?;
    Ok(ok(PaginatedResponse::new(tasks, &pagination, total)))
}

/// Get a single task with its subtasks
pub async fn get_task(State(db): State<DbState>, EntityId(id): EntityId) -> ApiResult<Response> {
    info!("Getting task: {}", id);
    Ok(ok(db.task_storage.get(&id).await?))
}

pub async fn create_task(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(input): ApiJson<TaskCreateInput>,
) -> ApiResult<Response> {
    info!("Creating task '{}' on board {}", input.title, input.board_id);
    Ok(created(db.task_storage.create(input, &actor).await?))
}

pub async fn update_task(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
    ApiJson(input): ApiJson<TaskUpdateInput>,
) -> ApiResult<Response> {
    info!("Updating task: {}", id);
    Ok(ok(db.task_storage.update(&id, input, &actor).await?))
}

pub async fn delete_task(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
) -> ApiResult<Response> {
    info!("Deleting task: {}", id);
    db.task_storage.delete(&id, &actor).await?;
    Ok(ok(Deleted::new(id)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TaskStatus,
}

pub async fn update_task_status(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
    ApiJson(request): ApiJson<UpdateStatusRequest>,
) -> ApiResult<Response> {
    info!("Setting task {} status to {}", id, request.status);
    Ok(ok(db.task_storage.update_status(&id, request.status, &actor).await?))
}

/// `{"agentId": "..."}` assigns, `{"agentId": null}` unassigns
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    #[serde(default, alias = "agent_id")]
    pub agent_id: Option<String>,
}

pub async fn assign_task(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
    ApiJson(request): ApiJson<AssignRequest>,
) -> ApiResult<Response> {
    info!("Assigning task {} to {:?}", id, request.agent_id);
    let task = db
        .task_storage
        .assign(&id, request.agent_id.as_deref(), &actor)
        .await?;
    Ok(ok(task))
}

pub async fn move_task(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
    ApiJson(input): ApiJson<TaskMoveInput>,
) -> ApiResult<Response> {
    info!("Moving task {} to column {}", id, input.column_id);
    Ok(ok(db.task_storage.move_task(&id, input, &actor).await?))
}

pub async fn bulk_tasks(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    caller: MaybeAgent,
    ApiJson(input): ApiJson<BulkInput>,
) -> ApiResult<Response> {
    info!("Bulk {:?} on {} tasks", input.action, input.task_ids.len());
    if input.action == BulkAction::Delete {
        caller.require(Requirement::new(Resource::Tasks, Access::Delete))?;
    }
    Ok(ok(db.task_storage.bulk(input, &actor).await?))
}
