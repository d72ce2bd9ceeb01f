// ABOUTME: Area storage layer using SQLite
// ABOUTME: Areas are the top of the hierarchy and share one global position sequence

use benos_core::{validate_description, validate_hex_color, validate_name, Actor};
use benos_storage::{
    ActivityAction, ActivityLogger, EntityType, NewActivity, PositionAllocator, PositionScope,
    StorageError, StorageResult,
};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::debug;

use crate::types::{Area, AreaCreateInput, AreaUpdateInput};

pub struct AreaStorage {
    pool: SqlitePool,
    positions: PositionAllocator,
    activity: ActivityLogger,
}

impl AreaStorage {
    pub fn new(pool: SqlitePool, positions: PositionAllocator, activity: ActivityLogger) -> Self {
        Self {
            pool,
            positions,
            activity,
        }
    }

    pub async fn list(&self) -> StorageResult<Vec<Area>> {
        let rows = sqlx::query("SELECT * FROM areas ORDER BY position ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_area).collect()
    }

    pub async fn get(&self, id: &str) -> StorageResult<Area> {
        let row = sqlx::query("SELECT * FROM areas WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::not_found(format!("area {}", id)))?;
        row_to_area(&row)
    }

    pub async fn create(&self, input: AreaCreateInput, actor: &Actor) -> StorageResult<Area> {
        let name = validate_name("name", &input.name)?;
        validate_description(input.description.as_deref())?;
        if let Some(color) = &input.color {
            validate_hex_color("color", color)?;
        }
        debug!("Creating area '{}'", name);

        let mut tx = self.positions.begin().await?;
        let position = tx.next(&PositionScope::Areas).await?;
        let now = Utc::now();
        let area = Area {
            id: benos_core::generate_id(),
            name,
            description: input.description,
            color: input.color,
            icon: input.icon,
            position,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO areas (id, name, description, color, icon, position, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&area.id)
        .bind(&area.name)
        .bind(&area.description)
        .bind(&area.color)
        .bind(&area.icon)
        .bind(area.position)
        .bind(area.created_at)
        .bind(area.updated_at)
        .execute(tx.conn())
        .await?;
        tx.commit().await?;

        self.activity.record(
            NewActivity::new(EntityType::Area, &area.id, ActivityAction::Created, actor)
                .with_after(&area),
        );
        Ok(area)
    }

    pub async fn update(&self, id: &str, input: AreaUpdateInput, actor: &Actor) -> StorageResult<Area> {
        let before = self.get(id).await?;
        let mut area = before.clone();

        if let Some(name) = input.name {
            area.name = validate_name("name", &name)?;
        }
        if let Some(description) = input.description {
            validate_description(description.as_deref())?;
            area.description = description;
        }
        if let Some(color) = input.color {
            if let Some(color) = &color {
                validate_hex_color("color", color)?;
            }
            area.color = color;
        }
        if let Some(icon) = input.icon {
            area.icon = icon;
        }
        area.updated_at = Utc::now();

        sqlx::query(
            "UPDATE areas SET name = ?, description = ?, color = ?, icon = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&area.name)
        .bind(&area.description)
        .bind(&area.color)
        .bind(&area.icon)
        .bind(area.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.activity.record(
            NewActivity::new(EntityType::Area, id, ActivityAction::Updated, actor)
                .with_before(&before)
                .with_after(&area),
        );
        Ok(area)
    }

    /// Deletes the area and everything beneath it
    pub async fn delete(&self, id: &str, actor: &Actor) -> StorageResult<()> {
        let before = self.get(id).await?;

        let mut tx = self.positions.begin().await?;
        sqlx::query("DELETE FROM areas WHERE id = ?")
            .bind(id)
            .execute(tx.conn())
            .await?;
        tx.compact(&PositionScope::Areas).await?;
        tx.commit().await?;

        self.activity.record(
            NewActivity::new(EntityType::Area, id, ActivityAction::Deleted, actor)
                .with_before(&before),
        );
        Ok(())
    }

    pub async fn reorder(&self, ordered_ids: &[String], actor: &Actor) -> StorageResult<Vec<Area>> {
        self.positions
            .reorder(&PositionScope::Areas, ordered_ids)
            .await?;
        self.activity.record(
            NewActivity::new(EntityType::Area, "*", ActivityAction::Reordered, actor)
                .with_metadata(serde_json::json!({ "areas": ordered_ids })),
        );
        self.list().await
    }
}

fn row_to_area(row: &SqliteRow) -> StorageResult<Area> {
    Ok(Area {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        color: row.try_get("color")?,
        icon: row.try_get("icon")?,
        position: row.try_get("position")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
