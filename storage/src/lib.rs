//! Chunked append-only storage (§4.1): the row codec, the per-table JSON
//! metadata sidecar, and the [`StorageManager`] that ties directory layout,
//! chunk files and metadata together.

mod codec;
mod manager;
mod metadata;

pub use codec::{
    decode_row, encode_row, encode_value, resync, DecodedRow, MARKER_DATETIME, MARKER_DECIMAL,
    MARKER_INTEGER, MARKER_LONG, MARKER_NULL, MARKER_REAL, MARKER_TEXT, ROW_SEPARATOR,
};
pub use manager::{RowStream, StorageManager};
pub use metadata::{delete_metadata, list_table_names, load_metadata, save_metadata, TableMetadata};

use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("corrupt row data: {detail}")]
    Corrupt { detail: String },

    #[error("database {0} does not exist")]
    DatabaseNotFound(String),

    #[error("table {table} does not exist in database {database}")]
    TableNotFound { database: String, table: String },

    #[error("table {table} already exists in database {database}")]
    TableAlreadyExists { database: String, table: String },

    #[error("chunk file {0} is missing")]
    ChunkMissing(Utf8PathBuf),
}
