mod boards;
mod subtasks;
mod tasks;

pub use boards::BoardStorage;
pub use subtasks::SubtaskStorage;
pub use tasks::{row_to_task, TaskStorage};
