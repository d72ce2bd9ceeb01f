// ABOUTME: Data layer shared by every Ben OS entity package
// ABOUTME: Connection pool, migrations, position counters, and the activity log

use benos_core::ValidationError;
use sqlx::error::ErrorKind;
use thiserror::Error;

pub mod activity;
pub mod db;
pub mod positions;

pub use activity::{
    ActivityAction, ActivityFilter, ActivityLog, ActivityLogger, ActivityStorage, EntityType,
    NewActivity,
};
pub use db::{connect, run_migrations};
pub use positions::{PositionAllocator, PositionScope, ScopedTx};

#[cfg(any(test, feature = "test-utils"))]
pub use db::memory_pool;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Sqlx error: {0}")]
    Sqlx(sqlx::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
}

impl StorageError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StorageError::NotFound("record".to_string()),
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::ForeignKeyViolation => {
                    StorageError::Validation("referenced record does not exist".to_string())
                }
                ErrorKind::UniqueViolation => {
                    StorageError::Conflict(format!("duplicate value: {}", db_err.message()))
                }
                ErrorKind::CheckViolation => {
                    StorageError::Validation(format!("invalid value: {}", db_err.message()))
                }
                _ => StorageError::Sqlx(err),
            },
            _ => StorageError::Sqlx(err),
        }
    }
}

impl From<ValidationError> for StorageError {
    fn from(err: ValidationError) -> Self {
        StorageError::Validation(err.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Reject a reference to a missing parent row with a validation error
pub async fn ensure_exists<'e, E>(executor: E, table: &'static str, id: &str) -> StorageResult<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let sql = format!("SELECT COUNT(*) FROM {} WHERE id = ?", table);
    let count: i64 = sqlx::query_scalar(&sql).bind(id).fetch_one(executor).await?;
    if count == 0 {
        let label = table.trim_end_matches('s');
        return Err(StorageError::Validation(format!("{} {} does not exist", label, id)));
    }
    Ok(())
}

/// Encode a list column (tags, capabilities, insights) as JSON text
pub fn encode_json<T: serde::Serialize>(value: &T) -> StorageResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// Decode a JSON text column, treating NULL as the type's default
pub fn decode_json<T>(raw: Option<String>) -> StorageResult<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    match raw {
        Some(text) if !text.is_empty() => Ok(serde_json::from_str(&text)?),
        _ => Ok(T::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_converts() {
        let err: StorageError = ValidationError::required("name").into();
        assert!(matches!(err, StorageError::Validation(ref m) if m == "name is required"));
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: StorageError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn test_decode_json_defaults_on_null() {
        let tags: Vec<String> = decode_json(None).unwrap();
        assert!(tags.is_empty());
        let tags: Vec<String> = decode_json(Some(r#"["a","b"]"#.to_string())).unwrap();
        assert_eq!(tags, vec!["a", "b"]);
    }
}
