// ABOUTME: Task storage layer using SQLite
// ABOUTME: CRUD plus status workflow, column moves, assignment, bulk edits, and search

use benos_core::ordering::{insert_at, move_to_index};
use benos_core::workflow::{completion_change, Completion};
use benos_core::{
    column_for_status, status_for_column, validate_description, validate_name, Actor, TaskStatus,
    ValidationError,
};
use benos_storage::{
    decode_json, encode_json, ActivityAction, ActivityLogger, EntityType, NewActivity,
    PositionAllocator, PositionScope, StorageError, StorageResult,
};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::debug;

use super::boards::row_to_board;
use super::subtasks::row_to_subtask;
use crate::types::{
    Board, BulkAction, BulkChanges, BulkFailure, BulkInput, BulkResult, Task, TaskCreateInput,
    TaskFilter, TaskMoveInput, TaskUpdateInput, MAX_BULK_TASKS,
};

pub struct TaskStorage {
    pool: SqlitePool,
    positions: PositionAllocator,
    activity: ActivityLogger,
}

impl TaskStorage {
    pub fn new(pool: SqlitePool, positions: PositionAllocator, activity: ActivityLogger) -> Self {
        Self {
            pool,
            positions,
            activity,
        }
    }

    /// Task with its subtasks
    pub async fn get(&self, id: &str) -> StorageResult<Task> {
        debug!("Fetching task: {}", id);
        let mut task = self.fetch(id).await?;

        let rows = sqlx::query("SELECT * FROM subtasks WHERE task_id = ? ORDER BY position ASC")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        task.subtasks = Some(rows.iter().map(row_to_subtask).collect::<StorageResult<_>>()?);
        Ok(task)
    }

    async fn fetch(&self, id: &str) -> StorageResult<Task> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::not_found(format!("task {}", id)))?;
        row_to_task(&row)
    }

    /// Board referenced by a request body; a missing board is a bad reference
    async fn referenced_board(&self, board_id: &str) -> StorageResult<Board> {
        let row = sqlx::query("SELECT * FROM boards WHERE id = ?")
            .bind(board_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::validation(format!("board {} does not exist", board_id)))?;
        row_to_board(&row)
    }

    async fn board_of(&self, task: &Task) -> StorageResult<Board> {
        let row = sqlx::query("SELECT * FROM boards WHERE id = ?")
            .bind(&task.board_id)
            .fetch_one(&self.pool)
            .await?;
        row_to_board(&row)
    }

    async fn ensure_active_agent(&self, agent_id: &str) -> StorageResult<()> {
        let active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM agents WHERE id = ?")
            .bind(agent_id)
            .fetch_optional(&self.pool)
            .await?;
        match active {
            Some(true) => Ok(()),
            Some(false) => Err(StorageError::validation(format!(
                "agent {} is inactive",
                agent_id
            ))),
            None => Err(StorageError::validation(format!(
                "agent {} does not exist",
                agent_id
            ))),
        }
    }

    pub async fn create(&self, input: TaskCreateInput, actor: &Actor) -> StorageResult<Task> {
        let title = validate_name("title", &input.title)?;
        validate_description(input.description.as_deref())?;
        let board = self.referenced_board(&input.board_id).await?;

        let column_id = match (&input.column_id, input.status) {
            (Some(column_id), _) => column_id.clone(),
            (None, Some(status)) => column_for_status(status)
                .filter(|column| board.has_column(column))
                .map(str::to_string)
                .or_else(|| board.first_column().map(|c| c.id.clone()))
                .ok_or_else(|| StorageError::validation("board has no columns"))?,
            (None, None) => board
                .first_column()
                .map(|c| c.id.clone())
                .ok_or_else(|| StorageError::validation("board has no columns"))?,
        };
        if !board.has_column(&column_id) {
            return Err(StorageError::validation(format!(
                "column {} does not exist on board {}",
                column_id, board.id
            )));
        }

        let status = input
            .status
            .or_else(|| status_for_column(&column_id))
            .unwrap_or(TaskStatus::Todo);
        if let Some(agent_id) = &input.assigned_agent_id {
            self.ensure_active_agent(agent_id).await?;
        }
        validate_hours("estimatedHours", input.estimated_hours)?;

        let now = Utc::now();
        let mut task = Task {
            id: benos_core::generate_id(),
            board_id: board.id.clone(),
            column_id,
            title,
            description: input.description,
            status,
            priority: input.priority.unwrap_or_default(),
            position: 0,
            milestone_id: input.milestone_id,
            prd_id: input.prd_id,
            assigned_agent_id: input.assigned_agent_id,
            due_date: input.due_date,
            estimated_hours: input.estimated_hours,
            actual_hours: None,
            tags: normalize_tags(input.tags.unwrap_or_default()),
            completed_at: (status == TaskStatus::Done).then_some(now),
            created_at: now,
            updated_at: now,
            subtasks: None,
        };

        debug!("Creating task '{}' on board {}", task.title, task.board_id);

        let mut tx = self.positions.begin().await?;
        task.position = tx
            .next(&PositionScope::column(&task.board_id, &task.column_id))
            .await?;

        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, board_id, column_id, title, description, status, priority, position,
                milestone_id, prd_id, assigned_agent_id, due_date, estimated_hours, actual_hours,
                tags, completed_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.id)
        .bind(&task.board_id)
        .bind(&task.column_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status)
        .bind(task.priority)
        .bind(task.position)
        .bind(&task.milestone_id)
        .bind(&task.prd_id)
        .bind(&task.assigned_agent_id)
        .bind(task.due_date)
        .bind(task.estimated_hours)
        .bind(task.actual_hours)
        .bind(encode_json(&task.tags)?)
        .bind(task.completed_at)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(tx.conn())
        .await?;
        tx.commit().await?;

        self.activity.record(
            NewActivity::new(EntityType::Task, &task.id, ActivityAction::Created, actor)
                .with_after(&task),
        );
        Ok(task)
    }

    /// Partial update. A status change goes through the column workflow.
    pub async fn update(
        &self,
        id: &str,
        input: TaskUpdateInput,
        actor: &Actor,
    ) -> StorageResult<Task> {
        debug!("Updating task: {}", id);
        let before = self.fetch(id).await?;

        if input.has_field_changes() {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE tasks SET updated_at = ");
            builder.push_bind(Utc::now());

            if let Some(title) = &input.title {
                builder.push(", title = ").push_bind(validate_name("title", title)?);
            }
            if let Some(description) = &input.description {
                validate_description(description.as_deref())?;
                builder.push(", description = ").push_bind(description.clone());
            }
            if let Some(priority) = input.priority {
                builder.push(", priority = ").push_bind(priority);
            }
            if let Some(milestone_id) = &input.milestone_id {
                builder.push(", milestone_id = ").push_bind(milestone_id.clone());
            }
            if let Some(prd_id) = &input.prd_id {
                builder.push(", prd_id = ").push_bind(prd_id.clone());
            }
            if let Some(due_date) = input.due_date {
                builder.push(", due_date = ").push_bind(due_date);
            }
            if let Some(estimated_hours) = input.estimated_hours {
                validate_hours("estimatedHours", estimated_hours)?;
                builder.push(", estimated_hours = ").push_bind(estimated_hours);
            }
            if let Some(actual_hours) = input.actual_hours {
                validate_hours("actualHours", actual_hours)?;
                builder.push(", actual_hours = ").push_bind(actual_hours);
            }
            if let Some(tags) = &input.tags {
                builder
                    .push(", tags = ")
                    .push_bind(encode_json(&normalize_tags(tags.clone()))?);
            }

            builder.push(" WHERE id = ").push_bind(id);
            builder.build().execute(&self.pool).await?;
        }

        if let Some(status) = input.status {
            let current = self.fetch(id).await?;
            self.apply_status(&current, status).await?;
        }

        let after = self.fetch(id).await?;
        self.activity.record(
            NewActivity::new(EntityType::Task, id, ActivityAction::Updated, actor)
                .with_before(&before)
                .with_after(&after),
        );
        Ok(after)
    }

    /// Set status; moves the task to the end of the mapped column when the board has it
    pub async fn update_status(
        &self,
        id: &str,
        status: TaskStatus,
        actor: &Actor,
    ) -> StorageResult<Task> {
        let before = self.fetch(id).await?;
        if before.status == status {
            return Ok(before);
        }
        self.apply_status(&before, status).await?;

        let after = self.fetch(id).await?;
        self.activity.record(
            NewActivity::new(EntityType::Task, id, ActivityAction::StatusChanged, actor)
                .with_before(&serde_json::json!({ "status": before.status, "columnId": before.column_id }))
                .with_after(&serde_json::json!({ "status": after.status, "columnId": after.column_id })),
        );
        Ok(after)
    }

    async fn apply_status(&self, task: &Task, status: TaskStatus) -> StorageResult<()> {
        if task.status == status {
            return Ok(());
        }
        let board = self.board_of(task).await?;
        let target_column = column_for_status(status)
            .filter(|column| board.has_column(column))
            .map(str::to_string)
            .unwrap_or_else(|| task.column_id.clone());
        let now = Utc::now();
        let completed_at = next_completed_at(task, status, now);

        let mut tx = self.positions.begin().await?;
        if target_column != task.column_id {
            let position = tx
                .next(&PositionScope::column(&task.board_id, &target_column))
                .await?;
            sqlx::query(
                "UPDATE tasks
                 SET column_id = ?, position = ?, status = ?, completed_at = ?, updated_at = ?
                 WHERE id = ?",
            )
            .bind(&target_column)
            .bind(position)
            .bind(status)
            .bind(completed_at)
            .bind(now)
            .bind(&task.id)
            .execute(tx.conn())
            .await?;
            tx.compact(&PositionScope::column(&task.board_id, &task.column_id))
                .await?;
        } else {
            sqlx::query("UPDATE tasks SET status = ?, completed_at = ?, updated_at = ? WHERE id = ?")
                .bind(status)
                .bind(completed_at)
                .bind(now)
                .bind(&task.id)
                .execute(tx.conn())
                .await?;
        }
        tx.commit().await
    }

    /// Assign to an active agent, or unassign with `None`
    pub async fn assign(
        &self,
        id: &str,
        agent_id: Option<&str>,
        actor: &Actor,
    ) -> StorageResult<Task> {
        let before = self.fetch(id).await?;
        if let Some(agent_id) = agent_id {
            self.ensure_active_agent(agent_id).await?;
        }

        sqlx::query("UPDATE tasks SET assigned_agent_id = ?, updated_at = ? WHERE id = ?")
            .bind(agent_id)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        let after = self.fetch(id).await?;
        self.activity.record(
            NewActivity::new(EntityType::Task, id, ActivityAction::Assigned, actor)
                .with_before(&serde_json::json!({ "assignedAgentId": before.assigned_agent_id }))
                .with_after(&serde_json::json!({ "assignedAgentId": after.assigned_agent_id })),
        );
        Ok(after)
    }

    /// Move within a column, to another column, or to another board of the
    /// same project. Both affected columns end up densely positioned.
    pub async fn move_task(
        &self,
        id: &str,
        input: TaskMoveInput,
        actor: &Actor,
    ) -> StorageResult<Task> {
        let before = self.fetch(id).await?;
        let source_board = self.board_of(&before).await?;
        let target_board = match &input.board_id {
            Some(board_id) if *board_id != before.board_id => {
                let board = self.referenced_board(board_id).await?;
                if board.project_id != source_board.project_id {
                    return Err(StorageError::validation(
                        "target board belongs to a different project",
                    ));
                }
                board
            }
            _ => source_board,
        };
        if !target_board.has_column(&input.column_id) {
            return Err(StorageError::validation(format!(
                "column {} does not exist on board {}",
                input.column_id, target_board.id
            )));
        }

        let status = status_for_column(&input.column_id).unwrap_or(before.status);
        let now = Utc::now();
        let completed_at = next_completed_at(&before, status, now);
        let source = PositionScope::column(&before.board_id, &before.column_id);
        let target = PositionScope::column(&target_board.id, &input.column_id);

        let mut tx = self.positions.begin().await?;
        if source == target {
            let ids = tx.ids_in_scope(&target).await?;
            let index = input.position.unwrap_or(ids.len());
            let order = move_to_index(&ids, id, index)
                .ok_or_else(|| StorageError::not_found(format!("task {}", id)))?;
            tx.write_order(&target, &order).await?;
            sqlx::query("UPDATE tasks SET updated_at = ? WHERE id = ?")
                .bind(now)
                .bind(id)
                .execute(tx.conn())
                .await?;
        } else {
            let staged = tx.next(&target).await?;
            sqlx::query(
                "UPDATE tasks
                 SET board_id = ?, column_id = ?, position = ?, status = ?, completed_at = ?, updated_at = ?
                 WHERE id = ?",
            )
            .bind(&target_board.id)
            .bind(&input.column_id)
            .bind(staged)
            .bind(status)
            .bind(completed_at)
            .bind(now)
            .bind(id)
            .execute(tx.conn())
            .await?;

            let ids = tx.ids_in_scope(&target).await?;
            let index = input.position.unwrap_or(ids.len());
            let order = insert_at(&ids, id, index);
            tx.write_order(&target, &order).await?;
            tx.compact(&source).await?;
        }
        tx.commit().await?;

        let after = self.fetch(id).await?;
        self.activity.record(
            NewActivity::new(EntityType::Task, id, ActivityAction::Moved, actor)
                .with_before(&before)
                .with_after(&after)
                .with_metadata(serde_json::json!({
                    "fromBoardId": before.board_id,
                    "fromColumnId": before.column_id,
                    "toBoardId": after.board_id,
                    "toColumnId": after.column_id,
                    "position": after.position,
                })),
        );
        Ok(after)
    }

    pub async fn delete(&self, id: &str, actor: &Actor) -> StorageResult<()> {
        let before = self.fetch(id).await?;

        let mut tx = self.positions.begin().await?;
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(tx.conn())
            .await?;
        tx.compact(&PositionScope::column(&before.board_id, &before.column_id))
            .await?;
        tx.commit().await?;

        self.activity.record(
            NewActivity::new(EntityType::Task, id, ActivityAction::Deleted, actor)
                .with_before(&before),
        );
        Ok(())
    }

    /// Apply one change set or a delete to many tasks; failures are reported per id
    pub async fn bulk(&self, input: BulkInput, actor: &Actor) -> StorageResult<BulkResult> {
        if input.task_ids.is_empty() {
            return Err(ValidationError::required("taskIds").into());
        }
        if input.task_ids.len() > MAX_BULK_TASKS {
            return Err(ValidationError::invalid(
                "taskIds",
                format!("at most {} tasks per request", MAX_BULK_TASKS),
            )
            .into());
        }
        let changes = match input.action {
            BulkAction::Update => input
                .changes
                .filter(|c| !c.is_empty())
                .ok_or_else(|| ValidationError::required("changes"))?,
            BulkAction::Delete => BulkChanges::default(),
        };

        let mut result = BulkResult::default();
        for id in &input.task_ids {
            let outcome = match input.action {
                BulkAction::Update => self.apply_bulk_changes(id, &changes, actor).await,
                BulkAction::Delete => self.delete(id, actor).await,
            };
            match outcome {
                Ok(()) => result.succeeded.push(id.clone()),
                Err(e) => result.failed.push(BulkFailure {
                    id: id.clone(),
                    error: e.to_string(),
                }),
            }
        }

        debug!(
            "Bulk {:?}: {} succeeded, {} failed",
            input.action,
            result.succeeded.len(),
            result.failed.len()
        );
        Ok(result)
    }

    async fn apply_bulk_changes(
        &self,
        id: &str,
        changes: &BulkChanges,
        actor: &Actor,
    ) -> StorageResult<()> {
        if changes.priority.is_some() || changes.milestone_id.is_some() {
            let update = TaskUpdateInput {
                priority: changes.priority,
                milestone_id: changes.milestone_id.clone(),
                ..Default::default()
            };
            self.update(id, update, actor).await?;
        }
        if let Some(status) = changes.status {
            self.update_status(id, status, actor).await?;
        }
        if let Some(agent_id) = &changes.assigned_agent_id {
            self.assign(id, agent_id.as_deref(), actor).await?;
        }
        Ok(())
    }

    /// Filtered listing with total count before pagination
    pub async fn search(&self, filter: &TaskFilter) -> StorageResult<(Vec<Task>, i64)> {
        let mut count_query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT COUNT(*) FROM tasks t JOIN boards b ON b.id = t.board_id WHERE 1 = 1",
        );
        push_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT t.* FROM tasks t JOIN boards b ON b.id = t.board_id WHERE 1 = 1");
        push_filters(&mut query, filter);
        if search_term(filter).is_some() {
            query.push(" ORDER BY t.updated_at DESC, t.id ASC");
        } else {
            query.push(" ORDER BY b.position ASC, t.board_id ASC, t.column_id ASC, t.position ASC");
        }
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit);
            query.push(" OFFSET ").push_bind(filter.offset.unwrap_or(0));
        }

        let rows = query.build().fetch_all(&self.pool).await?;
        let tasks = rows.iter().map(row_to_task).collect::<StorageResult<Vec<_>>>()?;
        Ok((tasks, total))
    }

    pub async fn list_for_board(&self, board_id: &str) -> StorageResult<Vec<Task>> {
        let filter = TaskFilter {
            board_id: Some(board_id.to_string()),
            ..Default::default()
        };
        Ok(self.search(&filter).await?.0)
    }
}

fn search_term(filter: &TaskFilter) -> Option<&str> {
    filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &TaskFilter) {
    if let Some(board_id) = &filter.board_id {
        builder.push(" AND t.board_id = ").push_bind(board_id.clone());
    }
    if let Some(project_id) = &filter.project_id {
        builder.push(" AND b.project_id = ").push_bind(project_id.clone());
    }
    if let Some(column_id) = &filter.column_id {
        builder.push(" AND t.column_id = ").push_bind(column_id.clone());
    }
    if let Some(status) = filter.status {
        builder.push(" AND t.status = ").push_bind(status);
    }
    if let Some(priority) = filter.priority {
        builder.push(" AND t.priority = ").push_bind(priority);
    }
    if let Some(agent_id) = &filter.assigned_agent_id {
        builder.push(" AND t.assigned_agent_id = ").push_bind(agent_id.clone());
    }
    if let Some(milestone_id) = &filter.milestone_id {
        builder.push(" AND t.milestone_id = ").push_bind(milestone_id.clone());
    }
    if let Some(prd_id) = &filter.prd_id {
        builder.push(" AND t.prd_id = ").push_bind(prd_id.clone());
    }
    if let Some(term) = search_term(filter) {
        let pattern = format!("%{}%", escape_like(term));
        builder
            .push(" AND (t.title LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR t.description LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

fn next_completed_at(
    task: &Task,
    status: TaskStatus,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match completion_change(task.status, status) {
        Completion::Stamp => Some(now),
        Completion::Clear => None,
        Completion::Keep => task.completed_at,
    }
}

fn validate_hours(field: &str, hours: Option<f64>) -> Result<(), ValidationError> {
    match hours {
        Some(value) if !value.is_finite() || value < 0.0 => {
            Err(ValidationError::invalid(field, "must be a non-negative number"))
        }
        _ => Ok(()),
    }
}

/// Trim, drop empties, and dedupe while keeping first-seen order
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Map a `tasks` row; extra joined columns are ignored
pub fn row_to_task(row: &SqliteRow) -> StorageResult<Task> {
    Ok(Task {
        id: row.try_get("id")?,
        board_id: row.try_get("board_id")?,
        column_id: row.try_get("column_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: row.try_get("status")?,
        priority: row.try_get("priority")?,
        position: row.try_get("position")?,
        milestone_id: row.try_get("milestone_id")?,
        prd_id: row.try_get("prd_id")?,
        assigned_agent_id: row.try_get("assigned_agent_id")?,
        due_date: row.try_get("due_date")?,
        estimated_hours: row.try_get("estimated_hours")?,
        actual_hours: row.try_get("actual_hours")?,
        tags: decode_json(row.try_get("tags")?)?,
        completed_at: row.try_get("completed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        subtasks: None,
    })
}
