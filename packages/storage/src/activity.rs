// ABOUTME: Append-only activity log recording who changed what
// ABOUTME: Writes are spawned in the background so a logging failure never fails a mutation
// ABOUTME: Pending writes are tracked and drained with ActivityLogger::flush before exit

use benos_core::{generate_id, Actor, ActorKind, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::StorageResult;

pub const DEFAULT_ACTIVITY_LIMIT: i64 = 50;
pub const MAX_ACTIVITY_LIMIT: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Area,
    Project,
    Milestone,
    Board,
    Task,
    Subtask,
    Prd,
    Agent,
    Report,
}

impl EntityType {
    pub const ALL: [EntityType; 9] = [
        EntityType::Area,
        EntityType::Project,
        EntityType::Milestone,
        EntityType::Board,
        EntityType::Task,
        EntityType::Subtask,
        EntityType::Prd,
        EntityType::Agent,
        EntityType::Report,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Area => "area",
            EntityType::Project => "project",
            EntityType::Milestone => "milestone",
            EntityType::Board => "board",
            EntityType::Task => "task",
            EntityType::Subtask => "subtask",
            EntityType::Prd => "prd",
            EntityType::Agent => "agent",
            EntityType::Report => "report",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationError::invalid_enum("entity_type", s, &EntityType::ALL))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Created,
    Updated,
    Deleted,
    Moved,
    StatusChanged,
    Assigned,
    Reordered,
    Restored,
    KeyRotated,
}

impl ActivityAction {
    pub const ALL: [ActivityAction; 9] = [
        ActivityAction::Created,
        ActivityAction::Updated,
        ActivityAction::Deleted,
        ActivityAction::Moved,
        ActivityAction::StatusChanged,
        ActivityAction::Assigned,
        ActivityAction::Reordered,
        ActivityAction::Restored,
        ActivityAction::KeyRotated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityAction::Created => "created",
            ActivityAction::Updated => "updated",
            ActivityAction::Deleted => "deleted",
            ActivityAction::Moved => "moved",
            ActivityAction::StatusChanged => "status_changed",
            ActivityAction::Assigned => "assigned",
            ActivityAction::Reordered => "reordered",
            ActivityAction::Restored => "restored",
            ActivityAction::KeyRotated => "key_rotated",
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActivityAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ValidationError::invalid_enum("action", s, &ActivityAction::ALL))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub action: ActivityAction,
    pub actor_type: ActorKind,
    pub actor_id: Option<String>,
    pub actor_name: Option<String>,
    pub before_state: Option<serde_json::Value>,
    pub after_state: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// An entry waiting to be written
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub action: ActivityAction,
    pub actor: Actor,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
    pub occurred_at: DateTime<Utc>,
}

impl NewActivity {
    pub fn new(
        entity_type: EntityType,
        entity_id: impl Into<String>,
        action: ActivityAction,
        actor: &Actor,
    ) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
            action,
            actor: actor.clone(),
            before: None,
            after: None,
            metadata: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_before<T: Serialize>(mut self, state: &T) -> Self {
        self.before = serde_json::to_value(state).ok();
        self
    }

    pub fn with_after<T: Serialize>(mut self, state: &T) -> Self {
        self.after = serde_json::to_value(state).ok();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityFilter {
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<String>,
    pub actor_id: Option<String>,
    pub action: Option<ActivityAction>,
    pub limit: Option<i64>,
}

impl ActivityFilter {
    pub fn for_entity(entity_type: EntityType, entity_id: &str) -> Self {
        Self {
            entity_type: Some(entity_type),
            entity_id: Some(entity_id.to_string()),
            ..Default::default()
        }
    }

    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
            .clamp(1, MAX_ACTIVITY_LIMIT)
    }
}

pub struct ActivityStorage {
    pool: SqlitePool,
}

impl ActivityStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, entry: &NewActivity) -> StorageResult<ActivityLog> {
        let log = ActivityLog {
            id: generate_id(),
            entity_type: entry.entity_type,
            entity_id: entry.entity_id.clone(),
            action: entry.action,
            actor_type: entry.actor.kind,
            actor_id: entry.actor.id.clone(),
            actor_name: entry.actor.name.clone(),
            before_state: entry.before.clone(),
            after_state: entry.after.clone(),
            metadata: entry.metadata.clone(),
            created_at: entry.occurred_at,
        };

        sqlx::query(
            r#"
            INSERT INTO activity_logs (
                id, entity_type, entity_id, action, actor_type, actor_id, actor_name,
                before_state, after_state, metadata, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&log.id)
        .bind(log.entity_type)
        .bind(&log.entity_id)
        .bind(log.action)
        .bind(log.actor_type)
        .bind(&log.actor_id)
        .bind(&log.actor_name)
        .bind(log.before_state.as_ref().map(|v| v.to_string()))
        .bind(log.after_state.as_ref().map(|v| v.to_string()))
        .bind(log.metadata.as_ref().map(|v| v.to_string()))
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;

        debug!(
            entity_type = %log.entity_type,
            entity_id = %log.entity_id,
            action = %log.action,
            "Recorded activity"
        );
        Ok(log)
    }

    /// Newest first
    pub async fn list(&self, filter: &ActivityFilter) -> StorageResult<Vec<ActivityLog>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM activity_logs WHERE 1 = 1");

        if let Some(entity_type) = filter.entity_type {
            builder.push(" AND entity_type = ").push_bind(entity_type);
        }
        if let Some(entity_id) = &filter.entity_id {
            builder.push(" AND entity_id = ").push_bind(entity_id.clone());
        }
        if let Some(actor_id) = &filter.actor_id {
            builder.push(" AND actor_id = ").push_bind(actor_id.clone());
        }
        if let Some(action) = filter.action {
            builder.push(" AND action = ").push_bind(action);
        }
        builder
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(filter.effective_limit());

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_activity).collect()
    }
}

fn parse_state(raw: Option<String>) -> Option<serde_json::Value> {
    raw.and_then(|text| serde_json::from_str(&text).ok())
}

fn row_to_activity(row: &SqliteRow) -> StorageResult<ActivityLog> {
    Ok(ActivityLog {
        id: row.try_get("id")?,
        entity_type: row.try_get("entity_type")?,
        entity_id: row.try_get("entity_id")?,
        action: row.try_get("action")?,
        actor_type: row.try_get("actor_type")?,
        actor_id: row.try_get("actor_id")?,
        actor_name: row.try_get("actor_name")?,
        before_state: parse_state(row.try_get("before_state")?),
        after_state: parse_state(row.try_get("after_state")?),
        metadata: parse_state(row.try_get("metadata")?),
        created_at: row.try_get("created_at")?,
    })
}

/// Fire-and-forget front for `ActivityStorage`
#[derive(Clone)]
pub struct ActivityLogger {
    storage: Arc<ActivityStorage>,
    pending: Arc<Mutex<JoinSet<()>>>,
}

impl ActivityLogger {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            storage: Arc::new(ActivityStorage::new(pool)),
            pending: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    pub fn storage(&self) -> &ActivityStorage {
        &self.storage
    }

    fn pending(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Spawn the insert without waiting for it. Failures are logged, never returned.
    pub fn record(&self, entry: NewActivity) {
        let storage = self.storage.clone();
        let mut pending = self.pending();
        while pending.try_join_next().is_some() {}
        pending.spawn(async move {
            if let Err(e) = storage.insert(&entry).await {
                warn!(
                    entity_type = %entry.entity_type,
                    entity_id = %entry.entity_id,
                    action = %entry.action,
                    "Failed to record activity: {}",
                    e
                );
            }
        });
    }

    /// Number of writes spawned but not yet reaped
    pub fn pending_writes(&self) -> usize {
        self.pending().len()
    }

    /// Wait for every write recorded so far
    pub async fn flush(&self) {
        let mut writes = std::mem::take(&mut *self.pending());
        if writes.is_empty() {
            return;
        }
        debug!(pending = writes.len(), "Flushing activity writes");
        while let Some(result) = writes.join_next().await {
            if let Err(e) = result {
                warn!("Activity write task failed: {}", e);
            }
        }
    }
}
