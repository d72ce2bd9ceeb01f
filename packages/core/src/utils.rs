// ABOUTME: Shared utility functions for Ben OS
// ABOUTME: ID generation and display helpers

use uuid::Uuid;

/// Generate a new entity ID (UUID v4, hyphenated)
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Number of characters of an API key kept for display
pub const KEY_PREFIX_LEN: usize = 12;

/// Return the displayable prefix of an API key
pub fn key_prefix(key: &str) -> String {
    key.chars().take(KEY_PREFIX_LEN).collect()
}
