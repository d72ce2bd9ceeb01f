// ABOUTME: HTTP request handlers for agent management
// ABOUTME: Agents are API-key identities; plaintext keys appear only in create and rotate responses

use axum::{extract::State, response::Response};
use benos_projects::DbState;
use benos_security::{AgentCreateInput, AgentUpdateInput};
use tracing::info;

use crate::extract::{ApiJson, CurrentActor, CurrentAgent, EntityId};
use crate::response::{created, ok, ApiResult, Deleted};

pub async fn list_agents(State(db): State<DbState>) -> ApiResult<Response> {
    info!("Listing agents");
    Ok(ok(db.agent_storage.list().await?))
}

pub async fn get_agent(State(db): State<DbState>, EntityId(id): EntityId) -> ApiResult<Response> {
    info!("Getting agent: {}", id);
    Ok(ok(db.agent_storage.get(&id).await?))
}

/// The agent that owns the presented key
pub async fn get_current_agent(CurrentAgent(agent): CurrentAgent) -> ApiResult<Response> {
    info!("Agent {} requested its own record", agent.id);
    Ok(ok(agent))
}

pub async fn create_agent(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(input): ApiJson<AgentCreateInput>,
) -> ApiResult<Response> {
    info!("Creating agent '{}'", input.name);
    Ok(created(db.agent_storage.create(input, &actor).await?))
}

pub async fn update_agent(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
    ApiJson(input): ApiJson<AgentUpdateInput>,
) -> ApiResult<Response> {
    info!("Updating agent: {}", id);
    Ok(ok(db.agent_storage.update(&id, input, &actor).await?))
}

pub async fn delete_agent(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
) -> ApiResult<Response> {
    info!("Deleting agent: {}", id);
    db.agent_storage.delete(&id, &actor).await?;
    Ok(ok(Deleted::new(id)))
}

pub async fn rotate_agent_key(
    State(db): State<DbState>,
    CurrentActor(actor): CurrentActor,
    EntityId(id): EntityId,
) -> ApiResult<Response> {
    info!("Rotating key for agent: {}", id);
    Ok(ok(db.agent_storage.rotate_key(&id, &actor).await?))
}
