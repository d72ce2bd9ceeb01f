// ABOUTME: HTTP request handlers for Kanban boards
// ABOUTME: GET on a single board returns the column view with its tasks

use axum::{extract::State, response::Response};
use benos_projects::DbState;
use benos_tasks::{BoardCreateInput, BoardUpdateInput};
use tracing::info;

use crate::extract::{ApiJson, ApiQuery, CurrentActor, EntityId};
use crate::milestones_handlers::{ProjectScopeQuery, ReorderWithinProjectRequest};
use crate::response::{created, ok, ApiResult, Deleted};

pub async fn list_boards(
    State(db): State<DbState>,
    ApiQuery(query): ApiQuery<ProjectScopeQuery>,
) -> ApiResult<Response> {
    info!("Listing boards");
    Ok(ok(db.board_storage.list(query.project_id.as_deref()).await?))
}

pub async fn get_board(State(db): State<DbState>, EntityId(id): EntityId) -> ApiResult<Response> {
    info!("Getting board view: {}", id);
    Ok(ok(db.board_storage.board_view(&id).await?))
}

pub async fn create_board(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(input): ApiJson<BoardCreateInput>,
) -> ApiResult<Response> {
    info!("Creating board '{}' in project {}", input.name, input.project_id);
    Ok(created(db.board_storage.create(input, &actor).await?))
}

pub async fn update_board(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
    ApiJson(input): ApiJson<BoardUpdateInput>,
) -> ApiResult<Response> {
    info!("Updating board: {}", id);
    Ok(ok(db.board_storage.update(&id, input, &actor).await?))
}

pub async fn delete_board(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
) -> ApiResult<Response> {
    info!("Deleting board: {}", id);
    db.board_storage.delete(&id, &actor).await?;
    Ok(ok(Deleted::new(id)))
}

pub async fn reorder_boards(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<ReorderWithinProjectRequest>,
) -> ApiResult<Response> {
    info!("Reordering boards in project {}", request.project_id);
    let boards = db
        .board_storage
        .reorder(&request.project_id, &request.ordered_ids, &actor)
        .await?;
    Ok(ok(boards))
}
