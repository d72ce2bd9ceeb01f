// ABOUTME: Board storage layer using SQLite
// ABOUTME: Column lists are stored as JSON; the board view groups tasks by column

use benos_core::{
    default_columns, validate_description, validate_hex_color, validate_name, Actor, BoardColumn,
    ValidationError,
};
use benos_storage::{
    decode_json, encode_json, ensure_exists, ActivityAction, ActivityLogger, EntityType,
    NewActivity, PositionAllocator, PositionScope, StorageError, StorageResult,
};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::collections::HashSet;
use tracing::debug;

use super::tasks::row_to_task;
use crate::types::{
    Board, BoardCreateInput, BoardUpdateInput, BoardView, ColumnView, MAX_BOARD_COLUMNS,
};

pub struct BoardStorage {
    pool: SqlitePool,
    positions: PositionAllocator,
    activity: ActivityLogger,
}

impl BoardStorage {
    pub fn new(pool: SqlitePool, positions: PositionAllocator, activity: ActivityLogger) -> Self {
        Self {
            pool,
            positions,
            activity,
        }
    }

    pub async fn list(&self, project_id: Option<&str>) -> StorageResult<Vec<Board>> {
        debug!("Fetching boards (project: {:?})", project_id);
        let rows = match project_id {
            Some(project_id) => {
                sqlx::query("SELECT * FROM boards WHERE project_id = ? ORDER BY position ASC")
                    .bind(project_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM boards ORDER BY project_id ASC, position ASC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(row_to_board).collect()
    }

    pub async fn get(&self, id: &str) -> StorageResult<Board> {
        let row = sqlx::query("SELECT * FROM boards WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::not_found(format!("board {}", id)))?;
        row_to_board(&row)
    }

    pub async fn create(&self, input: BoardCreateInput, actor: &Actor) -> StorageResult<Board> {
        let name = validate_name("name", &input.name)?;
        validate_description(input.description.as_deref())?;
        let columns = input.columns.unwrap_or_else(default_columns);
        validate_columns(&columns)?;

        debug!("Creating board '{}' in project {}", name, input.project_id);

        let mut tx = self.positions.begin().await?;
        ensure_exists(tx.conn(), "projects", &input.project_id).await?;
        let position = tx.next(&PositionScope::boards(&input.project_id)).await?;

        let now = Utc::now();
        let board = Board {
            id: benos_core::generate_id(),
            project_id: input.project_id,
            name,
            description: input.description,
            columns,
            position,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO boards (id, project_id, name, description, columns, position, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&board.id)
        .bind(&board.project_id)
        .bind(&board.name)
        .bind(&board.description)
        .bind(encode_json(&board.columns)?)
        .bind(board.position)
        .bind(board.created_at)
        .bind(board.updated_at)
        .execute(tx.conn())
        .await?;
        tx.commit().await?;

        self.activity.record(
            NewActivity::new(EntityType::Board, &board.id, ActivityAction::Created, actor)
                .with_after(&board),
        );
        Ok(board)
    }

    pub async fn update(
        &self,
        id: &str,
        input: BoardUpdateInput,
        actor: &Actor,
    ) -> StorageResult<Board> {
        let before = self.get(id).await?;
        let mut board = before.clone();

        if let Some(name) = input.name {
            board.name = validate_name("name", &name)?;
        }
        if let Some(description) = input.description {
            validate_description(description.as_deref())?;
            board.description = description;
        }
        if let Some(columns) = input.columns {
            validate_columns(&columns)?;
            self.ensure_removed_columns_empty(&before, &columns).await?;
            board.columns = columns;
        }
        board.updated_at = Utc::now();

        sqlx::query(
            "UPDATE boards SET name = ?, description = ?, columns = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&board.name)
        .bind(&board.description)
        .bind(encode_json(&board.columns)?)
        .bind(board.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.activity.record(
            NewActivity::new(EntityType::Board, id, ActivityAction::Updated, actor)
                .with_before(&before)
                .with_after(&board),
        );
        Ok(board)
    }

    /// Deletes the board and, by cascade, its tasks and subtasks
    pub async fn delete(&self, id: &str, actor: &Actor) -> StorageResult<()> {
        let before = self.get(id).await?;

        let mut tx = self.positions.begin().await?;
        sqlx::query("DELETE FROM boards WHERE id = ?")
            .bind(id)
            .execute(tx.conn())
            .await?;
        tx.compact(&PositionScope::boards(&before.project_id)).await?;
        tx.commit().await?;

        self.activity.record(
            NewActivity::new(EntityType::Board, id, ActivityAction::Deleted, actor)
                .with_before(&before),
        );
        Ok(())
    }

    pub async fn reorder(
        &self,
        project_id: &str,
        ordered_ids: &[String],
        actor: &Actor,
    ) -> StorageResult<Vec<Board>> {
        self.positions
            .reorder(&PositionScope::boards(project_id), ordered_ids)
            .await?;
        self.activity.record(
            NewActivity::new(EntityType::Project, project_id, ActivityAction::Reordered, actor)
                .with_metadata(serde_json::json!({ "boards": ordered_ids })),
        );
        self.list(Some(project_id)).await
    }

    /// Board with each column's tasks in position order
    pub async fn board_view(&self, id: &str) -> StorageResult<BoardView> {
        let board = self.get(id).await?;
        let rows = sqlx::query("SELECT * FROM tasks WHERE board_id = ? ORDER BY position ASC")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        let mut column_tasks: Vec<ColumnView> = board
            .columns
            .iter()
            .map(|column| ColumnView {
                column: column.clone(),
                tasks: Vec::new(),
            })
            .collect();

        for row in &rows {
            let task = row_to_task(row)?;
            if let Some(view) = column_tasks.iter_mut().find(|v| v.column.id == task.column_id) {
                view.tasks.push(task);
            }
        }

        Ok(BoardView {
            board,
            column_tasks,
        })
    }

    async fn ensure_removed_columns_empty(
        &self,
        board: &Board,
        next: &[BoardColumn],
    ) -> StorageResult<()> {
        for column in &board.columns {
            if next.iter().any(|c| c.id == column.id) {
                continue;
            }
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE board_id = ? AND column_id = ?")
                    .bind(&board.id)
                    .bind(&column.id)
                    .fetch_one(&self.pool)
                    .await?;
            if count > 0 {
                return Err(StorageError::validation(format!(
                    "column {} still holds {} task(s)",
                    column.id, count
                )));
            }
        }
        Ok(())
    }
}

/// Columns must be non-empty, bounded, and uniquely identified
pub fn validate_columns(columns: &[BoardColumn]) -> Result<(), ValidationError> {
    if columns.is_empty() {
        return Err(ValidationError::required("columns"));
    }
    if columns.len() > MAX_BOARD_COLUMNS {
        return Err(ValidationError::invalid(
            "columns",
            format!("at most {} columns allowed", MAX_BOARD_COLUMNS),
        ));
    }

    let mut seen = HashSet::new();
    for column in columns {
        if column.id.trim().is_empty() {
            return Err(ValidationError::required("columns.id"));
        }
        validate_name("columns.name", &column.name)?;
        if let Some(color) = &column.color {
            validate_hex_color("columns.color", color)?;
        }
        if !seen.insert(column.id.as_str()) {
            return Err(ValidationError::invalid(
                "columns",
                format!("duplicate column id {}", column.id),
            ));
        }
    }
    Ok(())
}

pub(crate) fn row_to_board(row: &SqliteRow) -> StorageResult<Board> {
    Ok(Board {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        columns: decode_json(row.try_get("columns")?)?,
        position: row.try_get("position")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_columns() {
        assert!(validate_columns(&default_columns()).is_ok());
        assert!(validate_columns(&[]).is_err());

        let dup = vec![BoardColumn::new("a", "A"), BoardColumn::new("a", "Again")];
        assert!(validate_columns(&dup).is_err());

        let too_many: Vec<BoardColumn> = (0..=MAX_BOARD_COLUMNS)
            .map(|i| BoardColumn::new(&format!("c{}", i), "Column"))
            .collect();
        assert!(validate_columns(&too_many).is_err());

        let mut colored = BoardColumn::new("x", "X");
        colored.color = Some("red".to_string());
        assert!(validate_columns(&[colored]).is_err());
    }
}
