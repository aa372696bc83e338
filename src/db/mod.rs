pub mod sqlite;
pub mod repository;

pub use sqlite::*;
pub use repository::*;

use thiserror::Error;

/// Storage format for calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Storage format for appointment times (minute precision).
pub const TIME_FORMAT: &str = "%H:%M";
/// Storage format for timestamps.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),
}

impl From<rusqlite::Error> for DatabaseError {
    /// UNIQUE violations are split out so callers can report a conflict
    /// instead of a generic storage failure.
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, message)
                if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                DatabaseError::ConstraintViolation(
                    message.clone().unwrap_or_else(|| "unique constraint".into()),
                )
            }
            _ => DatabaseError::Sqlite(err),
        }
    }
}

impl DatabaseError {
    pub fn not_found(entity_type: &str, id: impl ToString) -> Self {
        DatabaseError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DatabaseError::ConstraintViolation(_))
    }
}

/// Convert a parse failure inside a row mapper into a rusqlite error.
pub(crate) fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}
