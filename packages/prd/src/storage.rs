// ABOUTME: PRD storage layer using SQLite
// ABOUTME: Title or content edits snapshot the replaced revision before bumping the version

use benos_core::markdown::{document_title, extract_task_candidates, parse_sections};
use benos_core::{validate_name, Actor, BoardColumn};
use benos_storage::{
    decode_json, ensure_exists, ActivityAction, ActivityLogger, EntityType, NewActivity,
    StorageError, StorageResult,
};
use benos_tasks::{TaskCreateInput, TaskStorage};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::types::{
    ExtractTasksResult, Prd, PrdCreateInput, PrdSections, PrdStatus, PrdUpdateInput,
    PrdUploadInput, PrdVersion,
};

/// Maximum size of a PRD body (1MB)
pub const MAX_PRD_CONTENT_BYTES: usize = 1024 * 1024;

pub struct PrdStorage {
    pool: SqlitePool,
    activity: ActivityLogger,
    tasks: Arc<TaskStorage>,
}

/// Replacement revision written by an edit or a restore
struct Revision<'a> {
    title: &'a str,
    content: &'a str,
    status: PrdStatus,
    change_summary: Option<&'a str>,
}

impl PrdStorage {
    pub fn new(pool: SqlitePool, activity: ActivityLogger, tasks: Arc<TaskStorage>) -> Self {
        Self {
            pool,
            activity,
            tasks,
        }
    }

    pub async fn list(&self, project_id: Option<&str>) -> StorageResult<Vec<Prd>> {
        let prds = match project_id {
            Some(project_id) => {
                sqlx::query_as::<_, Prd>(
                    "SELECT * FROM prds WHERE project_id = ? ORDER BY updated_at DESC",
                )
                .bind(project_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Prd>("SELECT * FROM prds ORDER BY updated_at DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(prds)
    }

    pub async fn get(&self, id: &str) -> StorageResult<Prd> {
        sqlx::query_as::<_, Prd>("SELECT * FROM prds WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::not_found(format!("prd {}", id)))
    }

    pub async fn create(&self, input: PrdCreateInput, actor: &Actor) -> StorageResult<Prd> {
        let title = validate_name("title", &input.title)?;
        validate_content_size(&input.content)?;
        ensure_exists(&self.pool, "projects", &input.project_id).await?;

        debug!("Creating PRD '{}' in project {}", title, input.project_id);

        let now = Utc::now();
        let prd = sqlx::query_as::<_, Prd>(
            r#"
            INSERT INTO prds (id, project_id, title, content, version, status, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, 1, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(benos_core::generate_id())
        .bind(&input.project_id)
        .bind(&title)
        .bind(&input.content)
        .bind(input.status.unwrap_or_default())
        .bind(actor.id.as_deref())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        self.activity.record(
            NewActivity::new(EntityType::Prd, &prd.id, ActivityAction::Created, actor)
                .with_after(&summary(&prd)),
        );
        Ok(prd)
    }

    pub async fn update(&self, id: &str, input: PrdUpdateInput, actor: &Actor) -> StorageResult<Prd> {
        let before = self.get(id).await?;

        let title = match &input.title {
            Some(title) => validate_name("title", title)?,
            None => before.title.clone(),
        };
        let content = match &input.content {
            Some(content) => {
                validate_content_size(content)?;
                content.clone()
            }
            None => before.content.clone(),
        };
        let status = input.status.unwrap_or(before.status);
        let revised = title != before.title || content != before.content;

        let now = Utc::now();
        let prd = if revised {
            self.write_revision(
                &before,
                Revision {
                    title: &title,
                    content: &content,
                    status,
                    change_summary: input.change_summary.as_deref(),
                },
                actor,
                now,
            )
            .await?;
            self.get(id).await?
        } else {
            sqlx::query_as::<_, Prd>(
                "UPDATE prds SET status = ?, updated_at = ? WHERE id = ? RETURNING *",
            )
            .bind(status)
            .bind(now)
            .bind(id)
            .fetch_one(&self.pool)
            .await?
        };

        self.activity.record(
            NewActivity::new(EntityType::Prd, id, ActivityAction::Updated, actor)
                .with_before(&summary(&before))
                .with_after(&summary(&prd)),
        );
        Ok(prd)
    }

    /// Deletes the PRD and its versions; linked tasks keep existing unlinked
    pub async fn delete(&self, id: &str, actor: &Actor) -> StorageResult<()> {
        let before = self.get(id).await?;
        sqlx::query("DELETE FROM prds WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.activity.record(
            NewActivity::new(EntityType::Prd, id, ActivityAction::Deleted, actor)
                .with_before(&summary(&before)),
        );
        Ok(())
    }

    /// Snapshots of replaced revisions, newest first
    pub async fn versions(&self, id: &str) -> StorageResult<Vec<PrdVersion>> {
        self.get(id).await?;
        let versions = sqlx::query_as::<_, PrdVersion>(
            "SELECT * FROM prd_versions WHERE prd_id = ? ORDER BY version DESC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(versions)
    }

    /// Makes an earlier revision current again as a new version
    pub async fn restore_version(&self, id: &str, version: i64, actor: &Actor) -> StorageResult<Prd> {
        let before = self.get(id).await?;
        let snapshot = sqlx::query_as::<_, PrdVersion>(
            "SELECT * FROM prd_versions WHERE prd_id = ? AND version = ?",
        )
        .bind(id)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::not_found(format!("prd {} version {}", id, version)))?;

        info!("Restoring PRD {} to version {}", id, version);
        let change_summary = format!("Restored version {}", version);
        self.write_revision(
            &before,
            Revision {
                title: &snapshot.title,
                content: &snapshot.content,
                status: before.status,
                change_summary: Some(&change_summary),
            },
            actor,
            Utc::now(),
        )
        .await?;
        let prd = self.get(id).await?;

        self.activity.record(
            NewActivity::new(EntityType::Prd, id, ActivityAction::Restored, actor)
                .with_before(&summary(&before))
                .with_after(&summary(&prd))
                .with_metadata(serde_json::json!({ "restoredVersion": version })),
        );
        Ok(prd)
    }

    pub async fn sections(&self, id: &str) -> StorageResult<PrdSections> {
        let prd = self.get(id).await?;
        let parsed = parse_sections(&prd.content);
        Ok(PrdSections {
            prd_id: prd.id,
            title: parsed.title,
            preamble: parsed.preamble,
            sections: parsed.sections,
        })
    }

    pub async fn upload(&self, input: PrdUploadInput, actor: &Actor) -> StorageResult<Prd> {
        let title = input
            .title
            .filter(|title| !title.trim().is_empty())
            .or_else(|| document_title(&input.content))
            .unwrap_or_else(|| title_from_filename(&input.filename));

        self.create(
            PrdCreateInput {
                project_id: input.project_id,
                title,
                content: input.content,
                status: None,
            },
            actor,
        )
        .await
    }

    /// Creates a task in the board's first column for each open list item under a
    /// task-like heading; items already extracted to this board are skipped
    pub async fn extract_tasks(
        &self,
        prd_id: &str,
        board_id: &str,
        actor: &Actor,
    ) -> StorageResult<ExtractTasksResult> {
        let prd = self.get(prd_id).await?;

        let board: Option<(String, String)> =
            sqlx::query_as("SELECT project_id, columns FROM boards WHERE id = ?")
                .bind(board_id)
                .fetch_optional(&self.pool)
                .await?;
        let (project_id, columns) = board
            .ok_or_else(|| StorageError::validation(format!("board {} does not exist", board_id)))?;
        if project_id != prd.project_id {
            return Err(StorageError::validation(format!(
                "board {} belongs to a different project than prd {}",
                board_id, prd_id
            )));
        }
        let columns: Vec<BoardColumn> = decode_json(Some(columns))?;
        let first_column = columns
            .first()
            .map(|c| c.id.clone())
            .ok_or_else(|| StorageError::validation("board has no columns"))?;

        let existing: Vec<String> =
            sqlx::query_scalar("SELECT title FROM tasks WHERE board_id = ? AND prd_id = ?")
                .bind(board_id)
                .bind(prd_id)
                .fetch_all(&self.pool)
                .await?;
        let existing: HashSet<String> = existing.iter().map(|t| t.to_lowercase()).collect();

        let mut result = ExtractTasksResult::default();
        for candidate in extract_task_candidates(&prd.content) {
            if existing.contains(&candidate.title.to_lowercase()) {
                result.skipped.push(candidate.title);
                continue;
            }
            let task = self
                .tasks
                .create(
                    TaskCreateInput {
                        board_id: board_id.to_string(),
                        column_id: Some(first_column.clone()),
                        title: candidate.title,
                        description: Some(format!("From PRD section: {}", candidate.section)),
                        prd_id: Some(prd.id.clone()),
                        ..Default::default()
                    },
                    actor,
                )
                .await?;
            result.created.push(task);
        }

        info!(
            "Extracted {} task(s) from PRD {} ({} skipped)",
            result.created.len(),
            prd_id,
            result.skipped.len()
        );
        Ok(result)
    }

    async fn write_revision(
        &self,
        current: &Prd,
        next: Revision<'_>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO prd_versions (id, prd_id, version, title, content, change_summary, created_by, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(benos_core::generate_id())
        .bind(&current.id)
        .bind(current.version)
        .bind(&current.title)
        .bind(&current.content)
        .bind(next.change_summary)
        .bind(actor.id.as_deref())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE prds SET title = ?, content = ?, status = ?, version = version + 1, updated_at = ?
             WHERE id = ?",
        )
        .bind(next.title)
        .bind(next.content)
        .bind(next.status)
        .bind(now)
        .bind(&current.id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }
}

fn validate_content_size(content: &str) -> StorageResult<()> {
    if content.len() > MAX_PRD_CONTENT_BYTES {
        return Err(StorageError::validation(format!(
            "content exceeds maximum size of {} bytes (got {} bytes)",
            MAX_PRD_CONTENT_BYTES,
            content.len()
        )));
    }
    Ok(())
}

/// `habit-tracker_v2.md` becomes `habit tracker v2`
fn title_from_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    let title = stem.replace(['-', '_'], " ").trim().to_string();
    if title.is_empty() {
        "Untitled PRD".to_string()
    } else {
        title
    }
}

/// Activity snapshot without the markdown body
fn summary(prd: &Prd) -> serde_json::Value {
    serde_json::json!({
        "id": prd.id,
        "projectId": prd.project_id,
        "title": prd.title,
        "version": prd.version,
        "status": prd.status,
        "contentBytes": prd.content.len(),
    })
}
