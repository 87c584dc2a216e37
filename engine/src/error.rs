use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] storage::StorageError),

    #[error(transparent)]
    Table(#[from] table::TableError),

    #[error(transparent)]
    Parse(#[from] sql::ParseError),

    #[error("no database selected")]
    NoDatabaseSelected,

    #[error("database {0} does not exist")]
    DatabaseNotFound(String),

    #[error("unsupported statement: {0}")]
    Unsupported(String),
}

impl EngineError {
    /// Converts a typed failure into the user-facing result shape (§6/§7):
    /// `execute` never returns `Err`, it reports failure through
    /// `SqlResult.success = false` instead.
    pub fn to_sql_result(&self) -> crate::SqlResult {
        crate::SqlResult::error(self.to_string())
    }
}
