// ABOUTME: Product requirements documents for Ben OS
// ABOUTME: Versioned markdown PRDs with section parsing, upload, and task extraction

pub mod storage;
pub mod types;

pub use storage::{PrdStorage, MAX_PRD_CONTENT_BYTES};
pub use types::*;
