// ABOUTME: Common test utilities for task storage integration tests
// ABOUTME: In-memory database with storages wired up and parent rows inserted directly

#![allow(dead_code)]

use benos_core::Actor;
use benos_storage::{memory_pool, ActivityLogger, PositionAllocator};
use benos_tasks::{Board, BoardCreateInput, BoardStorage, SubtaskStorage, TaskCreateInput, TaskStorage};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct Fixture {
    pub pool: SqlitePool,
    pub boards: BoardStorage,
    pub tasks: Arc<TaskStorage>,
    pub subtasks: SubtaskStorage,
    pub activity: ActivityLogger,
    pub project_id: String,
    pub actor: Actor,
}

pub async fn setup() -> Fixture {
    let pool = memory_pool().await.unwrap();
    let positions = PositionAllocator::new(pool.clone());
    let activity = ActivityLogger::new(pool.clone());

    let area_id = insert_area(&pool).await;
    let project_id = insert_project(&pool, &area_id).await;

    Fixture {
        boards: BoardStorage::new(pool.clone(), positions.clone(), activity.clone()),
        tasks: Arc::new(TaskStorage::new(pool.clone(), positions.clone(), activity.clone())),
        subtasks: SubtaskStorage::new(pool.clone(), positions, activity.clone()),
        activity,
        project_id,
        actor: Actor::local_user(),
        pool,
    }
}

pub async fn insert_area(pool: &SqlitePool) -> String {
    let id = benos_core::generate_id();
    let position: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(position), -1) + 1 FROM areas")
        .fetch_one(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO areas (id, name, position, created_at, updated_at) VALUES (?, 'Work', ?, ?, ?)")
        .bind(&id)
        .bind(position)
        .bind(Utc::now())
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();
    id
}

pub async fn insert_project(pool: &SqlitePool, area_id: &str) -> String {
    let id = benos_core::generate_id();
    let position: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(position), -1) + 1 FROM projects WHERE area_id = ?")
            .bind(area_id)
            .fetch_one(pool)
            .await
            .unwrap();
    sqlx::query(
        "INSERT INTO projects (id, area_id, name, position, created_at, updated_at)
         VALUES (?, ?, 'Launch', ?, ?, ?)",
    )
    .bind(&id)
    .bind(area_id)
    .bind(position)
    .bind(Utc::now())
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap();
    id
}

pub async fn insert_agent(pool: &SqlitePool, active: bool) -> String {
    let id = benos_core::generate_id();
    sqlx::query(
        "INSERT INTO agents (id, name, key_prefix, key_hash, capabilities, is_active, created_at, updated_at)
         VALUES (?, ?, 'benos_abcdef', ?, '[\"*\"]', ?, ?, ?)",
    )
    .bind(&id)
    .bind(format!("agent-{}", &id[..8]))
    .bind(format!("hash-{}", id))
    .bind(active)
    .bind(Utc::now())
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap();
    id
}

impl Fixture {
    pub async fn board(&self) -> Board {
        self.boards
            .create(
                BoardCreateInput {
                    project_id: self.project_id.clone(),
                    name: "Sprint".to_string(),
                    description: None,
                    columns: None,
                },
                &self.actor,
            )
            .await
            .unwrap()
    }

    pub async fn task(&self, board_id: &str, title: &str) -> benos_tasks::Task {
        self.tasks
            .create(
                TaskCreateInput {
                    board_id: board_id.to_string(),
                    title: title.to_string(),
                    ..Default::default()
                },
                &self.actor,
            )
            .await
            .unwrap()
    }

    /// Titles and positions of one column, in order
    pub async fn column(&self, board_id: &str, column_id: &str) -> Vec<(String, i64)> {
        sqlx::query_as(
            "SELECT title, position FROM tasks WHERE board_id = ? AND column_id = ? ORDER BY position",
        )
        .bind(board_id)
        .bind(column_id)
        .fetch_all(&self.pool)
        .await
        .unwrap()
    }
}

/// Let spawned activity writes land
pub async fn settle(fx: &Fixture) {
    fx.activity.flush().await;
}
