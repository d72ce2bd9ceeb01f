// ABOUTME: Kanban boards, tasks, and subtasks
// ABOUTME: Storage keeps per-column positions dense and maps columns to task status

pub mod storage;
pub mod types;

pub use storage::*;
pub use types::*;
