// ABOUTME: Board, task, and subtask type definitions
// ABOUTME: Row structs plus create/update/move/bulk inputs and the board view

use benos_core::{double_option, BoardColumn, Priority, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_BOARD_COLUMNS: usize = 20;
pub const MAX_BULK_TASKS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub description: Option<String>,
    pub columns: Vec<BoardColumn>,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Board {
    pub fn has_column(&self, column_id: &str) -> bool {
        self.columns.iter().any(|c| c.id == column_id)
    }

    pub fn first_column(&self) -> Option<&BoardColumn> {
        self.columns.first()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardCreateInput {
    pub project_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Defaults to To Do / In Progress / Review / Done
    pub columns: Option<Vec<BoardColumn>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardUpdateInput {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub columns: Option<Vec<BoardColumn>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnView {
    #[serde(flatten)]
    pub column: BoardColumn,
    pub tasks: Vec<Task>,
}

/// A board with its columns filled in position order
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardView {
    #[serde(flatten)]
    pub board: Board,
    pub column_tasks: Vec<ColumnView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub board_id: String,
    pub column_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub position: i64,

    // Links
    pub milestone_id: Option<String>,
    pub prd_id: Option<String>,
    pub assigned_agent_id: Option<String>,

    // Planning
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub tags: Vec<String>,

    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<Subtask>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreateInput {
    pub board_id: String,
    pub column_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub milestone_id: Option<String>,
    pub prd_id: Option<String>,
    pub assigned_agent_id: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdateInput {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    /// Routed through the status workflow
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "double_option")]
    pub milestone_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub prd_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub estimated_hours: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub actual_hours: Option<Option<f64>>,
    pub tags: Option<Vec<String>>,
}

impl TaskUpdateInput {
    pub fn has_field_changes(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.priority.is_some()
            || self.milestone_id.is_some()
            || self.prd_id.is_some()
            || self.due_date.is_some()
            || self.estimated_hours.is_some()
            || self.actual_hours.is_some()
            || self.tags.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMoveInput {
    pub column_id: String,
    /// Zero-based index in the target column; end of column when absent
    pub position: Option<usize>,
    /// Another board of the same project
    pub board_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Update,
    Delete,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkChanges {
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_agent_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub milestone_id: Option<Option<String>>,
}

impl BulkChanges {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.priority.is_none()
            && self.assigned_agent_id.is_none()
            && self.milestone_id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkInput {
    pub task_ids: Vec<String>,
    pub action: BulkAction,
    pub changes: Option<BulkChanges>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFailure {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResult {
    pub succeeded: Vec<String>,
    pub failed: Vec<BulkFailure>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    pub board_id: Option<String>,
    pub project_id: Option<String>,
    pub column_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub assigned_agent_id: Option<String>,
    pub milestone_id: Option<String>,
    pub prd_id: Option<String>,
    /// Substring of title or description
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    pub task_id: String,
    pub title: String,
    pub completed: bool,
    pub position: i64,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskCreateInput {
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskUpdateInput {
    pub title: Option<String>,
    pub completed: Option<bool>,
}
