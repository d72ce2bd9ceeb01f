// ABOUTME: Type definitions for agents authenticated by API key
// ABOUTME: The key hash never leaves the server; the plaintext is returned once

use benos_core::Actor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capabilities::{allows, Capability, Requirement};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub key_prefix: String,
    #[serde(skip_serializing, default)]
    pub key_hash: String,
    pub capabilities: Vec<Capability>,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn actor(&self) -> Actor {
        Actor::agent(self.id.clone(), self.name.clone())
    }

    pub fn allows(&self, requirement: Requirement) -> bool {
        allows(&self.capabilities, requirement)
    }
}

/// Agent plus its freshly issued plaintext key
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentWithKey {
    #[serde(flatten)]
    pub agent: Agent,
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCreateInput {
    pub name: String,
    pub description: Option<String>,
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentUpdateInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub capabilities: Option<Vec<String>>,
    pub is_active: Option<bool>,
}
