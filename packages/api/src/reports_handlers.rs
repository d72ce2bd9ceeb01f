// ABOUTME: HTTP request handlers for reports
// ABOUTME: Generating a report snapshots and aggregates tasks in scope

use axum::{extract::State, response::Response};
use benos_projects::DbState;
use benos_reports::{ReportFilter, ReportRequest};
use tracing::info;

use crate::extract::{ApiJson, ApiQuery, CurrentActor, EntityId};
use crate::response::{created, ok, ApiResult, Deleted};

pub async fn list_reports(
    State(db): State<DbState>,
    ApiQuery(filter): ApiQuery<ReportFilter>,
) -> ApiResult<Response> {
    info!("Listing reports");
    Ok(ok(db.report_storage.list(&filter).await?))
}

pub async fn get_report(State(db): State<DbState>, EntityId(id): EntityId) -> ApiResult<Response> {
    info!("Getting report: {}", id);
    Ok(ok(db.report_storage.get(&id).await?))
}

pub async fn generate_report(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<ReportRequest>,
) -> ApiResult<Response> {
    info!("Generating {} report", request.report_type);
    Ok(created(db.report_storage.generate_report(request, &actor).await?))
}

pub async fn delete_report(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
) -> ApiResult<Response> {
    info!("Deleting report: {}", id);
    db.report_storage.delete(&id, &actor).await?;
    Ok(ok(Deleted::new(id)))
}
