// ABOUTME: HTTP request handlers for subtasks
// ABOUTME: Listing and creation under a task, edits and deletes by subtask id

use axum::{extract::State, response::Response};
use benos_projects::DbState;
use benos_tasks::{SubtaskCreateInput, SubtaskUpdateInput};
use serde::Deserialize;
use tracing::info;

use crate::extract::{ApiJson, CurrentActor, EntityId};
use crate::response::{created, ok, ApiResult, Deleted};

pub async fn list_subtasks(
    State(db): State<DbState>,
    EntityId(task_id): EntityId,
) -> ApiResult<Response> {
    info!("Listing subtasks for task: {}", task_id);
    Ok(ok(db.subtask_storage.list(&task_id).await?))
}

pub async fn create_subtask(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(task_id): EntityId,
    ApiJson(input): ApiJson<SubtaskCreateInput>,
) -> ApiResult<Response> {
    info!("Creating subtask under task: {}", task_id);
    Ok(created(db.subtask_storage.create(&task_id, input, &actor).await?))
}

pub async fn update_subtask(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
    ApiJson(input): ApiJson<SubtaskUpdateInput>,
) -> ApiResult<Response> {
    info!("Updating subtask: {}", id);
    Ok(ok(db.subtask_storage.update(&id, input, &actor).await?))
}

pub async fn toggle_subtask(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
) -> ApiResult<Response> {
    info!("Toggling subtask: {}", id);
    Ok(ok(db.subtask_storage.toggle(&id, &actor).await?))
}

pub async fn delete_subtask(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
) -> ApiResult<Response> {
    info!("Deleting subtask: {}", id);
    db.subtask_storage.delete(&id, &actor).await?;
    Ok(ok(Deleted::new(id)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderSubtasksRequest {
    #[serde(alias = "ordered_ids")]
    pub ordered_ids: Vec<String>,
}

pub async fn reorder_subtasks(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(task_id): EntityId,
    ApiJson(request): ApiJson<ReorderSubtasksRequest>,
) -> ApiResult<Response> {
    info!("Reordering subtasks of task: {}", task_id);
    let subtasks = db
        .subtask_storage
        .reorder(&task_id, &request.ordered_ids, &actor)
        .await?;
    Ok(ok(subtasks))
}
