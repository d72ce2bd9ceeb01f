// ABOUTME: HTTP request handler for the activity log
// ABOUTME: Newest-first audit entries filtered by entity, actor, or action

use axum::{extract::State, response::Response};
use benos_projects::DbState;
use benos_storage::ActivityFilter;
use tracing::info;

use crate::extract::ApiQuery;
use crate::response::{ok, ApiResult};

pub async fn list_activity(
    State(db): State<DbState>,
    ApiQuery(filter): ApiQuery<ActivityFilter>,
) -> ApiResult<Response> {
    info!(
        entity_type = ?filter.entity_type,
        entity_id = ?filter.entity_id,
        "Listing activity"
    );
    Ok(ok(db.activity_storage().list(&filter).await?))
}
