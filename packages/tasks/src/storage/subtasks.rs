// ABOUTME: Subtask storage layer using SQLite
// ABOUTME: Checklist items under a task with their own position sequence

use benos_core::{validate_name, Actor};
use benos_storage::{
    ensure_exists, ActivityAction, ActivityLogger, EntityType, NewActivity, PositionAllocator,
    PositionScope, StorageError, StorageResult,
};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::debug;

use crate::types::{Subtask, SubtaskCreateInput, SubtaskUpdateInput};

pub struct SubtaskStorage {
    pool: SqlitePool,
    positions: PositionAllocator,
    activity: ActivityLogger,
}

impl SubtaskStorage {
    pub fn new(pool: SqlitePool, positions: PositionAllocator, activity: ActivityLogger) -> Self {
        Self {
            pool,
            positions,
            activity,
        }
    }

    pub async fn list(&self, task_id: &str) -> StorageResult<Vec<Subtask>> {
        ensure_task(&self.pool, task_id).await?;
        let rows = sqlx::query("SELECT * FROM subtasks WHERE task_id = ? ORDER BY position ASC")
            .bind(task_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_subtask).collect()
    }

    pub async fn get(&self, id: &str) -> StorageResult<Subtask> {
        let row = sqlx::query("SELECT * FROM subtasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::not_found(format!("subtask {}", id)))?;
        row_to_subtask(&row)
    }

    pub async fn create(
        &self,
        task_id: &str,
        input: SubtaskCreateInput,
        actor: &Actor,
    ) -> StorageResult<Subtask> {
        let title = validate_name("title", &input.title)?;
        ensure_task(&self.pool, task_id).await?;
        debug!("Creating subtask under task {}", task_id);

        let mut tx = self.positions.begin().await?;
        let position = tx.next(&PositionScope::subtasks(task_id)).await?;
        let now = Utc::now();
        let subtask = Subtask {
            id: benos_core::generate_id(),
            task_id: task_id.to_string(),
            title,
            completed: false,
            position,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO subtasks (id, task_id, title, completed, position, created_at, updated_at)
             VALUES (?, ?, ?, 0, ?, ?, ?)",
        )
        .bind(&subtask.id)
        .bind(&subtask.task_id)
        .bind(&subtask.title)
        .bind(subtask.position)
        .bind(subtask.created_at)
        .bind(subtask.updated_at)
        .execute(tx.conn())
        .await?;
        tx.commit().await?;

        self.activity.record(
            NewActivity::new(EntityType::Subtask, &subtask.id, ActivityAction::Created, actor)
                .with_after(&subtask)
                .with_metadata(serde_json::json!({ "taskId": task_id })),
        );
        Ok(subtask)
    }

    pub async fn update(
        &self,
        id: &str,
        input: SubtaskUpdateInput,
        actor: &Actor,
    ) -> StorageResult<Subtask> {
        let before = self.get(id).await?;
        let mut subtask = before.clone();
        let now = Utc::now();

        if let Some(title) = input.title {
            subtask.title = validate_name("title", &title)?;
        }
        if let Some(completed) = input.completed {
            if completed != subtask.completed {
                subtask.completed = completed;
                subtask.completed_at = completed.then_some(now);
            }
        }
        subtask.updated_at = now;

        sqlx::query(
            "UPDATE subtasks SET title = ?, completed = ?, completed_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&subtask.title)
        .bind(subtask.completed)
        .bind(subtask.completed_at)
        .bind(subtask.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.activity.record(
            NewActivity::new(EntityType::Subtask, id, ActivityAction::Updated, actor)
                .with_before(&before)
                .with_after(&subtask),
        );
        Ok(subtask)
    }

    pub async fn complete(&self, id: &str, actor: &Actor) -> StorageResult<Subtask> {
        self.set_completed(id, true, actor).await
    }

    pub async fn toggle(&self, id: &str, actor: &Actor) -> StorageResult<Subtask> {
        let current = self.get(id).await?;
        self.set_completed(id, !current.completed, actor).await
    }

    async fn set_completed(&self, id: &str, completed: bool, actor: &Actor) -> StorageResult<Subtask> {
        self.update(
            id,
            SubtaskUpdateInput {
                completed: Some(completed),
                ..Default::default()
            },
            actor,
        )
        .await
    }

    pub async fn delete(&self, id: &str, actor: &Actor) -> StorageResult<()> {
        let before = self.get(id).await?;

        let mut tx = self.positions.begin().await?;
        sqlx::query("DELETE FROM subtasks WHERE id = ?")
            .bind(id)
            .execute(tx.conn())
            .await?;
        tx.compact(&PositionScope::subtasks(&before.task_id)).await?;
        tx.commit().await?;

        self.activity.record(
            NewActivity::new(EntityType::Subtask, id, ActivityAction::Deleted, actor)
                .with_before(&before),
        );
        Ok(())
    }

    pub async fn reorder(
        &self,
        task_id: &str,
        ordered_ids: &[String],
        actor: &Actor,
    ) -> StorageResult<Vec<Subtask>> {
        ensure_task(&self.pool, task_id).await?;
        self.positions
            .reorder(&PositionScope::subtasks(task_id), ordered_ids)
            .await?;
        self.activity.record(
            NewActivity::new(EntityType::Task, task_id, ActivityAction::Reordered, actor)
                .with_metadata(serde_json::json!({ "subtasks": ordered_ids })),
        );
        self.list(task_id).await
    }
}

async fn ensure_task(pool: &SqlitePool, task_id: &str) -> StorageResult<()> {
    ensure_exists(pool, "tasks", task_id)
        .await
        .map_err(|e| match e {
            StorageError::Validation(_) => StorageError::not_found(format!("task {}", task_id)),
            other => other,
        })
}

pub(crate) fn row_to_subtask(row: &SqliteRow) -> StorageResult<Subtask> {
    Ok(Subtask {
        id: row.try_get("id")?,
        task_id: row.try_get("task_id")?,
        title: row.try_get("title")?,
        completed: row.try_get("completed")?,
        position: row.try_get("position")?,
        completed_at: row.try_get("completed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
