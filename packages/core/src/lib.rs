// ABOUTME: Core types, traits, and utilities for Ben OS
// ABOUTME: Foundational package providing shared functionality across all Ben OS packages

pub mod constants;
pub mod markdown;
pub mod ordering;
pub mod patch;
pub mod types;
pub mod utils;
pub mod validation;
pub mod workflow;

// Re-export main types
pub use types::{Actor, ActorKind, Priority, TaskStatus};

// Re-export constants
pub use constants::{benos_dir, default_database_path, API_PREFIX};

// Re-export serde helpers
pub use patch::double_option;

// Re-export utilities
pub use utils::{generate_id, key_prefix};

// Re-export validation
pub use validation::{
    parse_uuid, require_non_empty, truncate, validate_description, validate_hex_color,
    validate_name, ValidationError,
};

// Re-export workflow
pub use workflow::{column_for_status, default_columns, status_for_column, BoardColumn};
