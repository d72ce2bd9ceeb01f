// ABOUTME: HTTP request handlers for milestone operations
// ABOUTME: CRUD scoped by project plus per-project reordering

use axum::{extract::State, response::Response};
use benos_projects::{DbState, MilestoneCreateInput, MilestoneUpdateInput};
use serde::Deserialize;
use tracing::info;

use crate::extract::{ApiJson, ApiQuery, CurrentActor, EntityId};
use crate::response::{created, ok, ApiResult, Deleted};

#[derive(Debug, Default, Deserialize)]
pub struct ProjectScopeQuery {
    pub project_id: Option<String>,
}

pub async fn list_milestones(
    State(db): State<DbState>,
    ApiQuery(query): ApiQuery<ProjectScopeQuery>,
) -> ApiResult<Response> {
    info!("Listing milestones");
    Ok(ok(db.milestone_storage.list(query.project_id.as_deref()).await?))
}

pub async fn get_milestone(State(db): State<DbState>, EntityId(id): EntityId) -> ApiResult<Response> {
    info!("Getting milestone: {}", id);
    Ok(ok(db.milestone_storage.get(&id).await?))
}

pub async fn create_milestone(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(input): ApiJson<MilestoneCreateInput>,
) -> ApiResult<Response> {
    info!("Creating milestone '{}' in project {}", input.name, input.project_id);
    Ok(created(db.milestone_storage.create(input, &actor).await?))
}

pub async fn update_milestone(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
    ApiJson(input): ApiJson<MilestoneUpdateInput>,
) -> ApiResult<Response> {
    info!("Updating milestone: {}", id);
    Ok(ok(db.milestone_storage.update(&id, input, &actor).await?))
}

pub async fn delete_milestone(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
) -> ApiResult<Response> {
    info!("Deleting milestone: {}", id);
    db.milestone_storage.delete(&id, &actor).await?;
    Ok(ok(Deleted::new(id)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderWithinProjectRequest {
    #[serde(alias = "project_id")]
    pub project_id: String,
    #[serde(alias = "ordered_ids")]
    pub ordered_ids: Vec<String>,
}

pub async fn reorder_milestones(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<ReorderWithinProjectRequest>,
) -> ApiResult<Response> {
    info!("Reordering milestones in project {}", request.project_id);
    let milestones = db
        .milestone_storage
        .reorder(&request.project_id, &request.ordered_ids, &actor)
        .await?;
    Ok(ok(milestones))
}
