// ABOUTME: Storage operations for agents and their API keys
// ABOUTME: Create, rotate, revoke, and constant-time verification against stored hashes

use benos_core::{validate_description, validate_name, Actor};
use benos_storage::{
    decode_json, encode_json, ActivityAction, ActivityLogger, EntityType, NewActivity,
    StorageError, StorageResult,
};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, info, warn};

use super::types::{Agent, AgentCreateInput, AgentUpdateInput, AgentWithKey};
use crate::capabilities::parse_capabilities;
use crate::keys::{hash_key, issue_key, looks_like_key, verify_key_hash};

pub struct AgentStorage {
    pool: SqlitePool,
    activity: ActivityLogger,
}

impl AgentStorage {
    pub fn new(pool: SqlitePool, activity: ActivityLogger) -> Self {
        Self { pool, activity }
    }

    pub async fn create(&self, input: AgentCreateInput, actor: &Actor) -> StorageResult<AgentWithKey> {
        let name = validate_name("name", &input.name)?;
        validate_description(input.description.as_deref())?;
        let capabilities = parse_capabilities(&input.capabilities)?;

        let issued = issue_key();
        let now = Utc::now();
        let agent = Agent {
            id: benos_core::generate_id(),
            name,
            description: input.description,
            key_prefix: issued.key_prefix,
            key_hash: issued.key_hash,
            capabilities,
            is_active: true,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        };

        debug!("Creating agent: {}", agent.name);

        sqlx::query(
            r#"
            INSERT INTO agents (
                id, name, description, key_prefix, key_hash, capabilities,
                is_active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(&agent.id)
        .bind(&agent.name)
        .bind(&agent.description)
        .bind(&agent.key_prefix)
        .bind(&agent.key_hash)
        .bind(encode_json(&agent.capabilities)?)
        .bind(agent.created_at)
        .bind(agent.updated_at)
        .execute(&self.pool)
        .await?;

        info!(agent_id = %agent.id, "Agent created");
        self.activity.record(
            NewActivity::new(EntityType::Agent, &agent.id, ActivityAction::Created, actor)
                .with_after(&agent),
        );

        Ok(AgentWithKey {
            agent,
            api_key: issued.key,
        })
    }

    pub async fn list(&self) -> StorageResult<Vec<Agent>> {
        let rows = sqlx::query("SELECT * FROM agents ORDER BY created_at ASC, name ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_agent).collect()
    }

    pub async fn get(&self, id: &str) -> StorageResult<Agent> {
        let row = sqlx::query("SELECT * FROM agents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::not_found(format!("agent {}", id)))?;
        row_to_agent(&row)
    }

    /// Agent by id, only if active. Used when assigning work.
    pub async fn get_active(&self, id: &str) -> StorageResult<Agent> {
        let agent = self.get(id).await?;
        if !agent.is_active {
            return Err(StorageError::validation(format!("agent {} is inactive", id)));
        }
        Ok(agent)
    }

    pub async fn update(
        &self,
        id: &str,
        input: AgentUpdateInput,
        actor: &Actor,
    ) -> StorageResult<Agent> {
        let before = self.get(id).await?;
        let mut agent = before.clone();

        if let Some(name) = input.name {
            agent.name = validate_name("name", &name)?;
        }
        if let Some(description) = input.description {
            validate_description(Some(&description))?;
            agent.description = Some(description);
        }
        if let Some(capabilities) = input.capabilities {
            agent.capabilities = parse_capabilities(&capabilities)?;
        }
        if let Some(is_active) = input.is_active {
            agent.is_active = is_active;
        }
        agent.updated_at = Utc::now();

        sqlx::query(
            "UPDATE agents
             SET name = ?, description = ?, capabilities = ?, is_active = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&agent.name)
        .bind(&agent.description)
        .bind(encode_json(&agent.capabilities)?)
        .bind(agent.is_active)
        .bind(agent.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.activity.record(
            NewActivity::new(EntityType::Agent, id, ActivityAction::Updated, actor)
                .with_before(&before)
                .with_after(&agent),
        );
        Ok(agent)
    }

    /// Deactivate without deleting; existing assignments keep their reference
    pub async fn revoke(&self, id: &str, actor: &Actor) -> StorageResult<Agent> {
        self.update(
            id,
            AgentUpdateInput {
                is_active: Some(false),
                ..Default::default()
            },
            actor,
        )
        .await
    }

    pub async fn delete(&self, id: &str, actor: &Actor) -> StorageResult<()> {
        let before = self.get(id).await?;
        sqlx::query("DELETE FROM agents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        info!(agent_id = %id, "Agent deleted");
        self.activity.record(
            NewActivity::new(EntityType::Agent, id, ActivityAction::Deleted, actor)
                .with_before(&before),
        );
        Ok(())
    }

    /// Replace the key. The old key stops working immediately.
    pub async fn rotate_key(&self, id: &str, actor: &Actor) -> StorageResult<AgentWithKey> {
        let mut agent = self.get(id).await?;
        let issued = issue_key();
        agent.key_prefix = issued.key_prefix;
        agent.key_hash = issued.key_hash;
        agent.updated_at = Utc::now();

        sqlx::query("UPDATE agents SET key_prefix = ?, key_hash = ?, updated_at = ? WHERE id = ?")
            .bind(&agent.key_prefix)
            .bind(&agent.key_hash)
            .bind(agent.updated_at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        info!(agent_id = %id, "Agent key rotated");
        self.activity.record(
            NewActivity::new(EntityType::Agent, id, ActivityAction::KeyRotated, actor)
                .with_metadata(serde_json::json!({ "keyPrefix": agent.key_prefix })),
        );

        Ok(AgentWithKey {
            agent,
            api_key: issued.key,
        })
    }

    /// Active agent owning `key`, if any
    pub async fn verify_key(&self, key: &str) -> StorageResult<Option<Agent>> {
        if !looks_like_key(key) {
            return Ok(None);
        }

        let row = sqlx::query("SELECT * FROM agents WHERE key_hash = ? AND is_active = 1")
            .bind(hash_key(key))
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let agent = row_to_agent(&row)?;
        if !verify_key_hash(key, &agent.key_hash) {
            return Ok(None);
        }

        self.touch_last_used(&agent.id);
        Ok(Some(agent))
    }

    fn touch_last_used(&self, id: &str) {
        let pool = self.pool.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            let result = sqlx::query("UPDATE agents SET last_used_at = ? WHERE id = ?")
                .bind(Utc::now())
                .bind(&id)
                .execute(&pool)
                .await;
            if let Err(e) = result {
                warn!(agent_id = %id, "Failed to update last_used_at: {}", e);
            }
        });
    }
}

fn row_to_agent(row: &SqliteRow) -> StorageResult<Agent> {
    Ok(Agent {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        key_prefix: row.try_get("key_prefix")?,
        key_hash: row.try_get("key_hash")?,
        capabilities: decode_json(row.try_get("capabilities")?)?,
        is_active: row.try_get("is_active")?,
        last_used_at: row.try_get("last_used_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
