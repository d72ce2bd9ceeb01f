// ABOUTME: HTTP request handlers for project operations
// ABOUTME: Paginated, filterable listing plus CRUD and per-area reordering

use axum::{extract::State, response::Response};
use benos_projects::{
    DbState, PaginatedResponse, PaginationParams, ProjectCreateInput, ProjectFilter, ProjectStatus,
    ProjectUpdateInput,
};
use serde::Deserialize;
use tracing::info;

use crate::extract::{ApiJson, ApiQuery, CurrentActor, EntityId};
use crate::response::{created, ok, ApiResult, Deleted};

/// `?area_id&status&page&limit`
#[derive(Debug, Default, Deserialize)]
pub struct ProjectListQuery {
    pub area_id: Option<String>,
    pub status: Option<ProjectStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_projects(
    State(db): State<DbState>,
    ApiQuery(query): ApiQuery<ProjectListQuery>,
) -> ApiResult<Response> {
    let pagination = PaginationParams {
        page: query.page,
        limit: query.limit,
    };
    info!("Listing projects (page: {})", pagination.page());

    let filter = ProjectFilter {
        area_id: query.area_id,
        status: query.status,
    };
    let (projects, total) = db.project_storage.list(&filter, Some(&pagination)).await?;
    Ok(ok(PaginatedResponse::new(projects, &pagination, total)))
}

pub async fn get_project(State(db): State<DbState>, EntityId(id): EntityId) -> ApiResult<Response> {
    info!("Getting project: {}", id);
    Ok(ok(db.project_storage.get(&id).await?))
}

pub async fn create_project(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(input): ApiJson<ProjectCreateInput>,
) -> ApiResult<Response> {
    info!("Creating project '{}' in area {}", input.name, input.area_id);
    Ok(created(db.project_storage.create(input, &actor).await?))
}

pub async fn update_project(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
    ApiJson(input): ApiJson<ProjectUpdateInput>,
) -> ApiResult<Response> {
    info!("Updating project: {}", id);
    Ok(ok(db.project_storage.update(&id, input, &actor).await?))
}

pub async fn delete_project(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
) -> ApiResult<Response> {
    info!("Deleting project: {}", id);
    db.project_storage.delete(&id, &actor).await?;
    Ok(ok(Deleted::new(id)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderProjectsRequest {
    #[serde(alias = "area_id")]
    pub area_id: String,
    #[serde(alias = "ordered_ids")]
    pub ordered_ids: Vec<String>,
}

pub async fn reorder_projects(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<ReorderProjectsRequest>,
) -> ApiResult<Response> {
    info!("Reordering projects in area {}", request.area_id);
    let projects = db
        .project_storage
        .reorder(&request.area_id, &request.ordered_ids, &actor)
        .await?;
    Ok(ok(projects))
}
