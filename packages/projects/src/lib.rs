//! # Ben OS Projects
//!
//! Areas, projects, and milestones, plus the [`DbState`] that wires every
//! storage layer to one SQLite pool for the HTTP API and the MCP server.

pub mod db;
pub mod pagination;
pub mod storage;
pub mod types;

// Re-export database state
pub use db::DbState;

// Re-export pagination types
pub use pagination::{PaginatedResponse, PaginationMeta, PaginationParams};

// Re-export storage layers and types
pub use storage::{AreaStorage, MilestoneStorage, ProjectStorage};
pub use types::*;
