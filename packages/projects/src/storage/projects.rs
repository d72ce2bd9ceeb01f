// ABOUTME: Project storage layer using SQLite
// ABOUTME: Projects are ordered within their area and can move between areas

use benos_core::{validate_description, validate_name, Actor, ValidationError};
use benos_storage::{
    ensure_exists, ActivityAction, ActivityLogger, EntityType, NewActivity, PositionAllocator,
    PositionScope, StorageError, StorageResult,
};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Executor, QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::debug;

use crate::pagination::PaginationParams;
use crate::types::{Project, ProjectCreateInput, ProjectFilter, ProjectUpdateInput};

pub struct ProjectStorage {
    pool: SqlitePool,
    positions: PositionAllocator,
    activity: ActivityLogger,
}

impl ProjectStorage {
    pub fn new(pool: SqlitePool, positions: PositionAllocator, activity: ActivityLogger) -> Self {
        Self {
            pool,
            positions,
            activity,
        }
    }

    /// Projects matching the filter and the total before paging
    pub async fn list(
        &self,
        filter: &ProjectFilter,
        page: Option<&PaginationParams>,
    ) -> StorageResult<(Vec<Project>, i64)> {
        debug!("Listing projects with filter: {:?}", filter);

        let mut count: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM projects WHERE 1 = 1");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM projects WHERE 1 = 1");
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY area_id ASC, position ASC");
        if let Some(page) = page {
            qb.push(" LIMIT ").push_bind(page.limit());
            qb.push(" OFFSET ").push_bind(page.offset());
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        let projects = rows.iter().map(row_to_project).collect::<StorageResult<_>>()?;
        Ok((projects, total))
    }

    pub async fn get(&self, id: &str) -> StorageResult<Project> {
        let row = sqlx::query("SELECT * FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::not_found(format!("project {}", id)))?;
        row_to_project(&row)
    }

    pub async fn create(&self, input: ProjectCreateInput, actor: &Actor) -> StorageResult<Project> {
        let name = validate_name("name", &input.name)?;
        validate_description(input.description.as_deref())?;
        validate_dates(input.start_date, input.target_date)?;

        debug!("Creating project '{}' in area {}", name, input.area_id);

        let mut tx = self.positions.begin().await?;
        ensure_exists(tx.conn(), "areas", &input.area_id).await?;
        let position = tx.next(&PositionScope::projects(&input.area_id)).await?;

        let now = Utc::now();
        let project = Project {
            id: benos_core::generate_id(),
            area_id: input.area_id,
            name,
            description: input.description,
            status: input.status.unwrap_or_default(),
            priority: input.priority.unwrap_or_default(),
            start_date: input.start_date,
            target_date: input.target_date,
            position,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO projects (id, area_id, name, description, status, priority, start_date,
                                   target_date, position, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&project.id)
        .bind(&project.area_id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.status)
        .bind(project.priority)
        .bind(project.start_date)
        .bind(project.target_date)
        .bind(project.position)
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(tx.conn())
        .await?;
        tx.commit().await?;

        self.activity.record(
            NewActivity::new(EntityType::Project, &project.id, ActivityAction::Created, actor)
                .with_after(&project),
        );
        Ok(project)
    }

    pub async fn update(
        &self,
        id: &str,
        input: ProjectUpdateInput,
        actor: &Actor,
    ) -> StorageResult<Project> {
        let before = self.get(id).await?;
        let mut project = before.clone();

        if let Some(name) = input.name {
            project.name = validate_name("name", &name)?;
        }
        if let Some(description) = input.description {
            validate_description(description.as_deref())?;
            project.description = description;
        }
        if let Some(status) = input.status {
            project.status = status;
        }
        if let Some(priority) = input.priority {
            project.priority = priority;
        }
        if let Some(start_date) = input.start_date {
            project.start_date = start_date;
        }
        if let Some(target_date) = input.target_date {
            project.target_date = target_date;
        }
        validate_dates(project.start_date, project.target_date)?;
        project.updated_at = Utc::now();

        let target_area = input.area_id.filter(|area| *area != before.area_id);
        let action = match target_area {
            Some(area_id) => {
                debug!("Moving project {} to area {}", id, area_id);
                let mut tx = self.positions.begin().await?;
                ensure_exists(tx.conn(), "areas", &area_id).await?;
                let position = tx.next(&PositionScope::projects(&area_id)).await?;
                write_fields(tx.conn(), &project).await?;
                sqlx::query("UPDATE projects SET area_id = ?, position = ? WHERE id = ?")
                    .bind(&area_id)
                    .bind(position)
                    .bind(id)
                    .execute(tx.conn())
                    .await?;
                tx.compact(&PositionScope::projects(&before.area_id)).await?;
                tx.commit().await?;
                ActivityAction::Moved
            }
            None => {
                // Position belongs to the allocator; a plain edit never writes it
                write_fields(&self.pool, &project).await?;
                ActivityAction::Updated
            }
        };
        let project = self.get(id).await?;

        self.activity.record(
            NewActivity::new(EntityType::Project, id, action, actor)
                .with_before(&before)
                .with_after(&project),
        );
        Ok(project)
    }

    /// Deletes the project with its milestones, boards, tasks, and PRDs
    pub async fn delete(&self, id: &str, actor: &Actor) -> StorageResult<()> {
        let before = self.get(id).await?;

        let mut tx = self.positions.begin().await?;
        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(tx.conn())
            .await?;
        tx.compact(&PositionScope::projects(&before.area_id)).await?;
        tx.commit().await?;

        self.activity.record(
            NewActivity::new(EntityType::Project, id, ActivityAction::Deleted, actor)
                .with_before(&before),
        );
        Ok(())
    }

    pub async fn reorder(
        &self,
        area_id: &str,
        ordered_ids: &[String],
        actor: &Actor,
    ) -> StorageResult<Vec<Project>> {
        self.positions
            .reorder(&PositionScope::projects(area_id), ordered_ids)
            .await?;
        self.activity.record(
            NewActivity::new(EntityType::Area, area_id, ActivityAction::Reordered, actor)
                .with_metadata(serde_json::json!({ "projects": ordered_ids })),
        );
        let filter = ProjectFilter {
            area_id: Some(area_id.to_string()),
            status: None,
        };
        Ok(self.list(&filter, None).await?.0)
    }
}

async fn write_fields<'e, E>(executor: E, project: &Project) -> StorageResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "UPDATE projects SET name = ?, description = ?, status = ?, priority = ?,
                start_date = ?, target_date = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.status)
    .bind(project.priority)
    .bind(project.start_date)
    .bind(project.target_date)
    .bind(project.updated_at)
    .bind(&project.id)
    .execute(executor)
    .await?;
    Ok(())
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ProjectFilter) {
    if let Some(area_id) = &filter.area_id {
        qb.push(" AND area_id = ").push_bind(area_id.clone());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
}

fn validate_dates(
    start: Option<DateTime<Utc>>,
    target: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    match (start, target) {
        (Some(start), Some(target)) if target < start => Err(ValidationError::invalid(
            "targetDate",
            "must not be before startDate",
        )),
        _ => Ok(()),
    }
}

fn row_to_project(row: &SqliteRow) -> StorageResult<Project> {
    Ok(Project {
        id: row.try_get("id")?,
        area_id: row.try_get("area_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        status: row.try_get("status")?,
        priority: row.try_get("priority")?,
        start_date: row.try_get("start_date")?,
        target_date: row.try_get("target_date")?,
        position: row.try_get("position")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
