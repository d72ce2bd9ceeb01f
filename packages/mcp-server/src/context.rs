//! Dependencies shared by every tool call
//!
//! Tests build a context over an in-memory database; the binary opens the
//! configured database and optionally binds an agent key.

use anyhow::{bail, Result};
use benos_core::Actor;
use benos_projects::DbState;
use benos_security::{Agent, Requirement};
use tracing::info;

use crate::tools::ToolError;

#[derive(Clone)]
pub struct ToolContext {
    pub(crate) db: DbState,
    pub(crate) agent: Option<Agent>,
}

impl ToolContext {
    /// Context acting as the local user with no capability limits
    pub fn new(db: DbState) -> Self {
        Self { db, agent: None }
    }

    /// Context bound to the agent owning `key`; fails unless the key is active
    pub async fn with_agent_key(db: DbState, key: &str) -> Result<Self> {
        let Some(agent) = db.agent_storage.verify_key(key).await? else {
            bail!("BENOS_AGENT_KEY is not an active agent key");
        };
        info!(agent_id = %agent.id, agent_name = %agent.name, "Acting as agent");
        Ok(Self {
            db,
            agent: Some(agent),
        })
    }

    pub fn db(&self) -> &DbState {
        &self.db
    }

    /// Who mutations are attributed to
    pub fn actor(&self) -> Actor {
        self.agent
            .as_ref()
            .map(Agent::actor)
            .unwrap_or_else(Actor::local_user)
    }

    pub fn authorize(&self, requirement: Requirement) -> Result<(), ToolError> {
        match &self.agent {
            Some(agent) if !agent.allows(requirement) => Err(ToolError::Forbidden(format!(
                "Agent lacks the '{}' capability",
                requirement
            ))),
            _ => Ok(()),
        }
    }
}
