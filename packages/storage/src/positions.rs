// ABOUTME: Atomic next-position counters and dense reindexing per parent scope
// ABOUTME: Creates, moves, and reorders run inside a ScopedTx holding the allocator lock

use benos_core::ordering::{dense_positions, validate_permutation};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::StorageResult;

/// A set of sibling rows that share one position sequence
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PositionScope {
    Areas,
    Projects { area_id: String },
    Milestones { project_id: String },
    Boards { project_id: String },
    Column { board_id: String, column_id: String },
    Subtasks { task_id: String },
}

impl PositionScope {
    pub fn projects(area_id: &str) -> Self {
        Self::Projects {
            area_id: area_id.to_string(),
        }
    }

    pub fn milestones(project_id: &str) -> Self {
        Self::Milestones {
            project_id: project_id.to_string(),
        }
    }

    pub fn boards(project_id: &str) -> Self {
        Self::Boards {
            project_id: project_id.to_string(),
        }
    }

    pub fn column(board_id: &str, column_id: &str) -> Self {
        Self::Column {
            board_id: board_id.to_string(),
            column_id: column_id.to_string(),
        }
    }

    pub fn subtasks(task_id: &str) -> Self {
        Self::Subtasks {
            task_id: task_id.to_string(),
        }
    }

    /// Counter row key
    pub fn key(&self) -> String {
        match self {
            Self::Areas => "areas".to_string(),
            Self::Projects { area_id } => format!("projects:{}", area_id),
            Self::Milestones { project_id } => format!("milestones:{}", project_id),
            Self::Boards { project_id } => format!("boards:{}", project_id),
            Self::Column {
                board_id,
                column_id,
            } => format!("tasks:{}:{}", board_id, column_id),
            Self::Subtasks { task_id } => format!("subtasks:{}", task_id),
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Self::Areas => "areas",
            Self::Projects { .. } => "projects",
            Self::Milestones { .. } => "milestones",
            Self::Boards { .. } => "boards",
            Self::Column { .. } => "tasks",
            Self::Subtasks { .. } => "subtasks",
        }
    }

    fn filters(&self) -> Vec<(&'static str, &str)> {
        match self {
            Self::Areas => Vec::new(),
            Self::Projects { area_id } => vec![("area_id", area_id.as_str())],
            Self::Milestones { project_id } | Self::Boards { project_id } => {
                vec![("project_id", project_id.as_str())]
            }
            Self::Column {
                board_id,
                column_id,
            } => vec![("board_id", board_id.as_str()), ("column_id", column_id.as_str())],
            Self::Subtasks { task_id } => vec![("task_id", task_id.as_str())],
        }
    }

    fn where_clause(&self) -> String {
        let filters = self.filters();
        if filters.is_empty() {
            return "1 = 1".to_string();
        }
        filters
            .iter()
            .map(|(column, _)| format!("{} = ?", column))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    fn values(&self) -> Vec<&str> {
        self.filters().into_iter().map(|(_, value)| value).collect()
    }
}

/// Hands out positions and serialises every position-changing write
#[derive(Clone)]
pub struct PositionAllocator {
    pool: SqlitePool,
    guard: Arc<Mutex<()>>,
}

impl PositionAllocator {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Take the allocator lock and open a transaction
    pub async fn begin(&self) -> StorageResult<ScopedTx> {
        let guard = self.guard.clone().lock_owned().await;
        let tx = self.pool.begin().await?;
        Ok(ScopedTx { _guard: guard, tx })
    }

    /// Allocate one position in its own transaction
    pub async fn next(&self, scope: &PositionScope) -> StorageResult<i64> {
        let mut tx = self.begin().await?;
        let position = tx.next(scope).await?;
        tx.commit().await?;
        Ok(position)
    }

    pub async fn ids_in_scope(&self, scope: &PositionScope) -> StorageResult<Vec<String>> {
        let mut tx = self.begin().await?;
        let ids = tx.ids_in_scope(scope).await?;
        tx.commit().await?;
        Ok(ids)
    }

    /// Rewrite a scope in the given order. Every id of the scope must appear once.
    pub async fn reorder(&self, scope: &PositionScope, ordered_ids: &[String]) -> StorageResult<()> {
        let mut tx = self.begin().await?;
        tx.reorder(scope, ordered_ids).await?;
        tx.commit().await
    }
}

/// Transaction plus the allocator lock; dropping it rolls back
pub struct ScopedTx {
    _guard: OwnedMutexGuard<()>,
    tx: Transaction<'static, Sqlite>,
}

impl ScopedTx {
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    /// Next position: greater than every row in the scope and every value
    /// previously handed out for it
    pub async fn next(&mut self, scope: &PositionScope) -> StorageResult<i64> {
        let table = scope.table();
        let filter = scope.where_clause();
        let sql = format!(
            "INSERT INTO position_counters (scope_key, next_position)
             VALUES (?, (SELECT COALESCE(MAX(position), -1) + 2 FROM {table} WHERE {filter}))
             ON CONFLICT(scope_key) DO UPDATE SET next_position = MAX(
                 position_counters.next_position,
                 (SELECT COALESCE(MAX(position), -1) + 1 FROM {table} WHERE {filter})
             ) + 1
             RETURNING next_position - 1 AS position"
        );

        let mut query = sqlx::query(&sql).bind(scope.key());
        let values = scope.values();
        for value in values.iter().chain(values.iter()) {
            query = query.bind(*value);
        }

        let row = query.fetch_one(&mut *self.tx).await?;
        let position: i64 = row.try_get("position")?;
        debug!(scope = %scope.key(), position, "Allocated position");
        Ok(position)
    }

    /// Ids of the scope ordered by position
    pub async fn ids_in_scope(&mut self, scope: &PositionScope) -> StorageResult<Vec<String>> {
        let sql = format!(
            "SELECT id FROM {} WHERE {} ORDER BY position ASC",
            scope.table(),
            scope.where_clause()
        );
        let mut query = sqlx::query(&sql);
        for value in scope.values() {
            query = query.bind(value);
        }

        let rows = query.fetch_all(&mut *self.tx).await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("id").map_err(Into::into))
            .collect()
    }

    /// Write dense positions for `ids` in two phases: negative staging values
    /// first, then `0..n-1`, so the unique position index holds throughout
    pub async fn write_order(&mut self, scope: &PositionScope, ids: &[String]) -> StorageResult<()> {
        let update = format!("UPDATE {} SET position = ? WHERE id = ?", scope.table());
        let dense = dense_positions(ids);

        for (id, position) in &dense {
            sqlx::query(&update)
                .bind(-(position + 1))
                .bind(id)
                .execute(&mut *self.tx)
                .await?;
        }
        for (id, position) in &dense {
            sqlx::query(&update)
                .bind(position)
                .bind(id)
                .execute(&mut *self.tx)
                .await?;
        }

        debug!(scope = %scope.key(), count = ids.len(), "Rewrote positions");
        Ok(())
    }

    pub async fn reorder(&mut self, scope: &PositionScope, ordered_ids: &[String]) -> StorageResult<()> {
        let current = self.ids_in_scope(scope).await?;
        validate_permutation(&current, ordered_ids)?;
        self.write_order(scope, ordered_ids).await
    }

    /// Close gaps left by a removal
    pub async fn compact(&mut self, scope: &PositionScope) -> StorageResult<()> {
        let ids = self.ids_in_scope(scope).await?;
        self.write_order(scope, &ids).await
    }

    pub async fn commit(self) -> StorageResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{memory_pool, StorageError};
    use pretty_assertions::assert_eq;

    async fn insert_area(pool: &SqlitePool, id: &str, position: i64) {
        sqlx::query(
            "INSERT INTO areas (id, name, position, created_at, updated_at)
             VALUES (?, ?, ?, 'now', 'now')",
        )
        .bind(id)
        .bind(id)
        .bind(position)
        .execute(pool)
        .await
        .unwrap();
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_scope_keys_are_distinct() {
        assert_eq!(PositionScope::Areas.key(), "areas");
        assert_eq!(PositionScope::column("b1", "todo").key(), "tasks:b1:todo");
        assert_ne!(
            PositionScope::boards("p1").key(),
            PositionScope::milestones("p1").key()
        );
    }

    #[tokio::test]
    async fn test_first_position_starts_after_existing_rows() {
        let pool = memory_pool().await.unwrap();
        let allocator = PositionAllocator::new(pool.clone());
        assert_eq!(allocator.next(&PositionScope::Areas).await.unwrap(), 0);

        insert_area(&pool, "a", 5).await;
        assert_eq!(allocator.next(&PositionScope::Areas).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_positions_never_repeat_after_delete() {
        let pool = memory_pool().await.unwrap();
        let allocator = PositionAllocator::new(pool.clone());

        let first = allocator.next(&PositionScope::Areas).await.unwrap();
        insert_area(&pool, "a", first).await;
        let second = allocator.next(&PositionScope::Areas).await.unwrap();
        insert_area(&pool, "b", second).await;

        sqlx::query("DELETE FROM areas WHERE id = 'b'")
            .execute(&pool)
            .await
            .unwrap();

        let third = allocator.next(&PositionScope::Areas).await.unwrap();
        assert!(third > second);
    }

    #[tokio::test]
    async fn test_concurrent_allocations_are_unique() {
        let pool = memory_pool().await.unwrap();
        let allocator = PositionAllocator::new(pool);

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let allocator = allocator.clone();
                tokio::spawn(async move { allocator.next(&PositionScope::Areas).await.unwrap() })
            })
            .collect();

        let mut positions = Vec::new();
        for handle in handles {
            positions.push(handle.await.unwrap());
        }
        positions.sort();
        positions.dedup();
        assert_eq!(positions.len(), 20);
    }

    #[tokio::test]
    async fn test_scopes_are_independent() {
        let pool = memory_pool().await.unwrap();
        let allocator = PositionAllocator::new(pool);

        allocator.next(&PositionScope::boards("p1")).await.unwrap();
        allocator.next(&PositionScope::boards("p1")).await.unwrap();
        assert_eq!(allocator.next(&PositionScope::boards("p2")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reorder_writes_dense_positions() {
        let pool = memory_pool().await.unwrap();
        let allocator = PositionAllocator::new(pool.clone());
        insert_area(&pool, "a", 0).await;
        insert_area(&pool, "b", 4).await;
        insert_area(&pool, "c", 9).await;

        allocator
            .reorder(&PositionScope::Areas, &ids(&["c", "a", "b"]))
            .await
            .unwrap();

        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT id, position FROM areas ORDER BY position")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(
            rows,
            vec![
                ("c".to_string(), 0),
                ("a".to_string(), 1),
                ("b".to_string(), 2)
            ]
        );
    }

    #[tokio::test]
    async fn test_reorder_rejects_partial_list() {
        let pool = memory_pool().await.unwrap();
        let allocator = PositionAllocator::new(pool.clone());
        insert_area(&pool, "a", 0).await;
        insert_area(&pool, "b", 1).await;

        let err = allocator
            .reorder(&PositionScope::Areas, &ids(&["b"]))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));

        let order = allocator.ids_in_scope(&PositionScope::Areas).await.unwrap();
        assert_eq!(order, ids(&["a", "b"]));
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let pool = memory_pool().await.unwrap();
        let allocator = PositionAllocator::new(pool.clone());
        insert_area(&pool, "a", 0).await;
        insert_area(&pool, "b", 1).await;

        {
            let mut tx = allocator.begin().await.unwrap();
            tx.write_order(&PositionScope::Areas, &ids(&["b", "a"]))
                .await
                .unwrap();
        }

        let order = allocator.ids_in_scope(&PositionScope::Areas).await.unwrap();
        assert_eq!(order, ids(&["a", "b"]));
    }
}
