// ABOUTME: HTTP request handlers for area operations
// ABOUTME: CRUD plus global reordering of areas

use axum::{extract::State, response::Response};
use benos_projects::{AreaCreateInput, AreaUpdateInput, DbState};
use serde::Deserialize;
use tracing::info;

use crate::extract::{ApiJson, CurrentActor, EntityId};
use crate::response::{created, ok, ApiResult, Deleted};

pub async fn list_areas(State(db): State<DbState>) -> ApiResult<Response> {
    info!("Listing areas");
    Ok(ok(db.area_storage.list().await?))
}

pub async fn get_area(State(db): State<DbState>, EntityId(id): EntityId) -> ApiResult<Response> {
    info!("Getting area: {}", id);
    Ok(ok(db.area_storage.get(&id).await?))
}

pub async fn create_area(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(input): ApiJson<AreaCreateInput>,
) -> ApiResult<Response> {
    info!("Creating area '{}'", input.name);
    Ok(created(db.area_storage.create(input, &actor).await?))
}

pub async fn update_area(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
    ApiJson(input): ApiJson<AreaUpdateInput>,
) -> ApiResult<Response> {
    info!("Updating area: {}", id);
    Ok(ok(db.area_storage.update(&id, input, &actor).await?))
}

pub async fn delete_area(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
) -> ApiResult<Response> {
    info!("Deleting area: {}", id);
    db.area_storage.delete(&id, &actor).await?;
    Ok(ok(Deleted::new(id)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderAreasRequest {
    #[serde(alias = "ordered_ids")]
    pub ordered_ids: Vec<String>,
}

pub async fn reorder_areas(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<ReorderAreasRequest>,
) -> ApiResult<Response> {
    info!("Reordering {} areas", request.ordered_ids.len());
    Ok(ok(db.area_storage.reorder(&request.ordered_ids, &actor).await?))
}
