use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error(transparent)]
    Storage(#[from] storage::StorageError),

    #[error("column {0} does not exist")]
    ColumnNotFound(String),

    #[error("column {column} does not accept NULL")]
    NotNullViolation { column: String },

    #[error("value for column {column} is {found}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },

    #[error("auto-increment column {column} requires a value >= 1, got {value}")]
    InvalidAutoIncrementValue { column: String, value: i64 },

    #[error("table has no primary key and no hidden row id to match on")]
    NoRowIdentity,
}
