// ABOUTME: Fixed mapping between task status and Kanban board columns
// ABOUTME: Used when a status change moves a card or a card move changes status

use serde::{Deserialize, Serialize};

use crate::types::TaskStatus;

/// A column on a Kanban board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardColumn {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl BoardColumn {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            color: None,
        }
    }
}

const STATUS_COLUMNS: &[(TaskStatus, &str)] = &[
    (TaskStatus::Todo, "todo"),
    (TaskStatus::InProgress, "in_progress"),
    (TaskStatus::Review, "review"),
    (TaskStatus::Done, "done"),
];

/// Column a task with this status belongs in, if any
pub fn column_for_status(status: TaskStatus) -> Option<&'static str> {
    STATUS_COLUMNS
        .iter()
        .find(|(s, _)| *s == status)
        .map(|(_, column)| *column)
}

/// Status implied by dropping a task into this column, if any
pub fn status_for_column(column_id: &str) -> Option<TaskStatus> {
    STATUS_COLUMNS
        .iter()
        .find(|(_, column)| *column == column_id)
        .map(|(status, _)| *status)
}

/// Columns every new board starts with
pub fn default_columns() -> Vec<BoardColumn> {
    vec![
        BoardColumn::new("todo", "To Do"),
        BoardColumn::new("in_progress", "In Progress"),
        BoardColumn::new("review", "Review"),
        BoardColumn::new("done", "Done"),
    ]
}

/// Whether a transition into `next` should stamp or clear `completed_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Stamp,
    Clear,
    Keep,
}

pub fn completion_change(previous: TaskStatus, next: TaskStatus) -> Completion {
    match (previous == TaskStatus::Done, next == TaskStatus::Done) {
        (false, true) => Completion::Stamp,
        (true, false) => Completion::Clear,
        _ => Completion::Keep,
    }
}
