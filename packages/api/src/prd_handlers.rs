// ABOUTME: HTTP request handlers for Product Requirements Documents
// ABOUTME: CRUD, markdown upload, version history and restore, sections, and task extraction

use axum::{extract::State, response::Response};
use benos_prd::{ExtractTasksInput, PrdCreateInput, PrdUpdateInput, PrdUploadInput};
use benos_projects::DbState;
use tracing::info;

use crate::extract::{ApiJson, ApiQuery, CurrentActor, EntityId, VersionPath};
use crate::milestones_handlers::ProjectScopeQuery;
use crate::response::{created, ok, ApiResult, Deleted};

pub async fn list_prds(
    State(db): State<DbState>,
    ApiQuery(query): ApiQuery<ProjectScopeQuery>,
) -> ApiResult<Response> {
    info!("Listing PRDs");
    Ok(ok(db.prd_storage.list(query.project_id.as_deref()).await?))
}

pub async fn get_prd(State(db): State<DbState>, EntityId(id): EntityId) -> ApiResult<Response> {
    info!("Getting PRD: {}", id);
    Ok(ok(db.prd_storage.get(&id).await?))
}

pub async fn create_prd(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(input): ApiJson<PrdCreateInput>,
) -> ApiResult<Response> {
    info!("Creating PRD '{}' in project {}", input.title, input.project_id);
    Ok(created(db.prd_storage.create(input, &actor).await?))
}

pub async fn update_prd(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
    ApiJson(input): ApiJson<PrdUpdateInput>,
) -> ApiResult<Response> {
    info!("Updating PRD: {}", id);
    Ok(ok(db.prd_storage.update(&id, input, &actor).await?))
}

pub async fn delete_prd(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
) -> ApiResult<Response> {
    info!("Deleting PRD: {}", id);
    db.prd_storage.delete(&id, &actor).await?;
    Ok(ok(Deleted::new(id)))
}

pub async fn upload_prd(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(input): ApiJson<PrdUploadInput>,
) -> ApiResult<Response> {
    info!("Uploading PRD file '{}' to project {}", input.filename, input.project_id);
    Ok(created(db.prd_storage.upload(input, &actor).await?))
}

pub async fn list_versions(State(db): State<DbState>, EntityId(id): EntityId) -> ApiResult<Response> {
    info!("Listing versions of PRD: {}", id);
    Ok(ok(db.prd_storage.versions(&id).await?))
}

pub async fn restore_version(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    path: VersionPath,
) -> ApiResult<Response> {
    info!("Restoring PRD {} to version {}", path.id, path.version);
    Ok(ok(db.prd_storage.restore_version(&path.id, path.version, &actor).await?))
}

pub async fn get_sections(State(db): State<DbState>, EntityId(id): EntityId) -> ApiResult<Response> {
    info!("Parsing sections of PRD: {}", id);
    Ok(ok(db.prd_storage.sections(&id).await?))
}

pub async fn extract_tasks(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
    ApiJson(input): ApiJson<ExtractTasksInput>,
) -> ApiResult<Response> {
    info!("Extracting tasks from PRD {} onto board {}", id, input.board_id);
    let result = db
        .prd_storage
        .extract_tasks(&id, &input.board_id, &actor)
        .await?;
    Ok(created(result))
}
