// ABOUTME: Database connection management and storage initialization
// ABOUTME: Provides shared access to the SQLite pool and every storage layer

use benos_prd::PrdStorage;
use benos_reports::{InsightGenerator, ReportStorage, RuleBasedInsights};
use benos_security::AgentStorage;
use benos_storage::{ActivityLogger, ActivityStorage, PositionAllocator, StorageResult};
use benos_tasks::{BoardStorage, SubtaskStorage, TaskStorage};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::storage::{AreaStorage, MilestoneStorage, ProjectStorage};

/// Shared database state for API handlers and MCP tools
#[derive(Clone)]
pub struct DbState {
    pub pool: SqlitePool,
    pub positions: PositionAllocator,
    pub activity: ActivityLogger,
    pub area_storage: Arc<AreaStorage>,
    pub project_storage: Arc<ProjectStorage>,
    pub milestone_storage: Arc<MilestoneStorage>,
    pub board_storage: Arc<BoardStorage>,
    pub task_storage: Arc<TaskStorage>,
    pub subtask_storage: Arc<SubtaskStorage>,
    pub prd_storage: Arc<PrdStorage>,
    pub agent_storage: Arc<AgentStorage>,
    pub report_storage: Arc<ReportStorage>,
}

impl DbState {
    /// Create new database state from a migrated SQLite pool
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_insights(pool, Arc::new(RuleBasedInsights))
    }

    /// Same as [`DbState::new`] with a custom report insight generator
    pub fn with_insights(pool: SqlitePool, insights: Arc<dyn InsightGenerator>) -> Self {
        let positions = PositionAllocator::new(pool.clone());
        let activity = ActivityLogger::new(pool.clone());
        let task_storage = Arc::new(TaskStorage::new(
            pool.clone(),
            positions.clone(),
            activity.clone(),
        ));

        Self {
            area_storage: Arc::new(AreaStorage::new(
                pool.clone(),
                positions.clone(),
                activity.clone(),
            )),
            project_storage: Arc::new(ProjectStorage::new(
                pool.clone(),
                positions.clone(),
                activity.clone(),
            )),
            milestone_storage: Arc::new(MilestoneStorage::new(
                pool.clone(),
                positions.clone(),
                activity.clone(),
            )),
            board_storage: Arc::new(BoardStorage::new(
                pool.clone(),
                positions.clone(),
                activity.clone(),
            )),
            subtask_storage: Arc::new(SubtaskStorage::new(
                pool.clone(),
                positions.clone(),
                activity.clone(),
            )),
            prd_storage: Arc::new(PrdStorage::new(
                pool.clone(),
                activity.clone(),
                task_storage.clone(),
            )),
            agent_storage: Arc::new(AgentStorage::new(pool.clone(), activity.clone())),
            report_storage: Arc::new(ReportStorage::new(pool.clone(), activity.clone(), insights)),
            task_storage,
            positions,
            activity,
            pool,
        }
    }

    /// Initialize database state at the default location (~/.benos/benos.db)
    pub async fn init() -> StorageResult<Self> {
        Self::init_with_path(None).await
    }

    /// Initialize database state with optional custom database path
    pub async fn init_with_path(database_path: Option<PathBuf>) -> StorageResult<Self> {
        let database_path = database_path.unwrap_or_else(benos_core::default_database_path);
        let pool = benos_storage::connect(&database_path).await?;
        info!("Database ready at {}", database_path.display());
        Ok(Self::new(pool))
    }

    /// Fresh in-memory database for tests
    #[cfg(any(test, feature = "test-utils"))]
    pub async fn in_memory() -> StorageResult<Self> {
        Ok(Self::new(benos_storage::memory_pool().await?))
    }

    pub fn activity_storage(&self) -> &ActivityStorage {
        self.activity.storage()
    }

    /// Wait for background activity writes; call before the process exits
    pub async fn flush_activity(&self) {
        self.activity.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_with_path_creates_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("benos.db");

        let db = DbState::init_with_path(Some(path.clone())).await.unwrap();
        assert!(path.exists());
        assert!(db.area_storage.list().await.unwrap().is_empty());
    }
}
