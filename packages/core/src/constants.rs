use std::env;
use std::path::PathBuf;

/// Prefix shared by every versioned REST route
pub const API_PREFIX: &str = "/api/v1";

/// File name of the SQLite database inside the Ben OS directory
pub const DATABASE_FILE: &str = "benos.db";

/// Maximum length for entity names and titles
pub const MAX_NAME_LENGTH: usize = 200;

/// Maximum length for free-text descriptions
pub const MAX_DESCRIPTION_LENGTH: usize = 10_000;

/// Get the path to the Ben OS directory (~/.benos)
pub fn benos_dir() -> PathBuf {
    // First try HOME environment variable (useful for tests)
    if let Ok(home) = env::var("HOME") {
        PathBuf::from(home).join(".benos")
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".benos")
    }
}

/// Get the default database path (~/.benos/benos.db)
pub fn default_database_path() -> PathBuf {
    benos_dir().join(DATABASE_FILE)
}
