// ABOUTME: Milestone storage layer using SQLite
// ABOUTME: Completing a milestone stamps completed_at; reopening clears it

use benos_core::{validate_description, validate_name, Actor};
use benos_storage::{
    ensure_exists, ActivityAction, ActivityLogger, EntityType, NewActivity, PositionAllocator,
    PositionScope, StorageError, StorageResult,
};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::debug;

use crate::types::{Milestone, MilestoneCreateInput, MilestoneStatus, MilestoneUpdateInput};

pub struct MilestoneStorage {
    pool: SqlitePool,
    positions: PositionAllocator,
    activity: ActivityLogger,
}

impl MilestoneStorage {
    pub fn new(pool: SqlitePool, positions: PositionAllocator, activity: ActivityLogger) -> Self {
        Self {
            pool,
            positions,
            activity,
        }
    }

    pub async fn list(&self, project_id: Option<&str>) -> StorageResult<Vec<Milestone>> {
        let rows = match project_id {
            Some(project_id) => {
                sqlx::query("SELECT * FROM milestones WHERE project_id = ? ORDER BY position ASC")
                    .bind(project_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM milestones ORDER BY project_id ASC, position ASC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(row_to_milestone).collect()
    }

    pub async fn get(&self, id: &str) -> StorageResult<Milestone> {
        let row = sqlx::query("SELECT * FROM milestones WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::not_found(format!("milestone {}", id)))?;
        row_to_milestone(&row)
    }

    pub async fn create(
        &self,
        input: MilestoneCreateInput,
        actor: &Actor,
    ) -> StorageResult<Milestone> {
        let name = validate_name("name", &input.name)?;
        validate_description(input.description.as_deref())?;
        debug!("Creating milestone '{}' in project {}", name, input.project_id);

        let mut tx = self.positions.begin().await?;
        ensure_exists(tx.conn(), "projects", &input.project_id).await?;
        let position = tx.next(&PositionScope::milestones(&input.project_id)).await?;

        let now = Utc::now();
        let status = input.status.unwrap_or_default();
        let milestone = Milestone {
            id: benos_core::generate_id(),
            project_id: input.project_id,
            name,
            description: input.description,
            status,
            due_date: input.due_date,
            position,
            completed_at: (status == MilestoneStatus::Completed).then_some(now),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO milestones (id, project_id, name, description, status, due_date, completed_at,
                                     position, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&milestone.id)
        .bind(&milestone.project_id)
        .bind(&milestone.name)
        .bind(&milestone.description)
        .bind(milestone.status)
        .bind(milestone.due_date)
        .bind(milestone.completed_at)
        .bind(milestone.position)
        .bind(milestone.created_at)
        .bind(milestone.updated_at)
        .execute(tx.conn())
        .await?;
        tx.commit().await?;

        self.activity.record(
            NewActivity::new(EntityType::Milestone, &milestone.id, ActivityAction::Created, actor)
                .with_after(&milestone),
        );
        Ok(milestone)
    }

    pub async fn update(
        &self,
        id: &str,
        input: MilestoneUpdateInput,
        actor: &Actor,
    ) -> StorageResult<Milestone> {
        let before = self.get(id).await?;
        let mut milestone = before.clone();
        let now = Utc::now();

        if let Some(name) = input.name {
            milestone.name = validate_name("name", &name)?;
        }
        if let Some(description) = input.description {
            validate_description(description.as_deref())?;
            milestone.description = description;
        }
        if let Some(due_date) = input.due_date {
            milestone.due_date = due_date;
        }
        if let Some(status) = input.status {
            match (before.status == MilestoneStatus::Completed, status == MilestoneStatus::Completed) {
                (false, true) => milestone.completed_at = Some(now),
                (true, false) => milestone.completed_at = None,
                _ => {}
            }
            milestone.status = status;
        }
        milestone.updated_at = now;

        sqlx::query(
            "UPDATE milestones SET name = ?, description = ?, status = ?, due_date = ?, completed_at = ?,
                    updated_at = ?
             WHERE id = ?",
        )
        .bind(&milestone.name)
        .bind(&milestone.description)
        .bind(milestone.status)
        .bind(milestone.due_date)
        .bind(milestone.completed_at)
        .bind(milestone.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        let action = if milestone.status != before.status {
            ActivityAction::StatusChanged
        } else {
            ActivityAction::Updated
        };
        self.activity.record(
            NewActivity::new(EntityType::Milestone, id, action, actor)
                .with_before(&before)
                .with_after(&milestone),
        );
        Ok(milestone)
    }

    /// Deletes the milestone; its tasks stay on their boards unlinked
    pub async fn delete(&self, id: &str, actor: &Actor) -> StorageResult<()> {
        let before = self.get(id).await?;

        let mut tx = self.positions.begin().await?;
        sqlx::query("DELETE FROM milestones WHERE id = ?")
            .bind(id)
            .execute(tx.conn())
            .await?;
        tx.compact(&PositionScope::milestones(&before.project_id)).await?;
        tx.commit().await?;

        self.activity.record(
            NewActivity::new(EntityType::Milestone, id, ActivityAction::Deleted, actor)
                .with_before(&before),
        );
        Ok(())
    }

    pub async fn reorder(
        &self,
        project_id: &str,
        ordered_ids: &[String],
        actor: &Actor,
    ) -> StorageResult<Vec<Milestone>> {
        self.positions
            .reorder(&PositionScope::milestones(project_id), ordered_ids)
            .await?;
        self.activity.record(
            NewActivity::new(EntityType::Project, project_id, ActivityAction::Reordered, actor)
                .with_metadata(serde_json::json!({ "milestones": ordered_ids })),
        );
        self.list(Some(project_id)).await
    }
}

fn row_to_milestone(row: &SqliteRow) -> StorageResult<Milestone> {
    Ok(Milestone {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        status: row.try_get("status")?,
        due_date: row.try_get("due_date")?,
        position: row.try_get("position")?,
        completed_at: row.try_get("completed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
