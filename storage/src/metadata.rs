//! The metadata store (C2): a durable JSON sidecar per table, holding
//! schema, row counters and auto-increment state (§3, §4.2).

use camino::Utf8Path;
use chrono::{DateTime, Utc};
use common::Column;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;

use crate::StorageError;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableMetadata {
    pub table_name: String,
    pub columns: Vec<Column>,
    pub total_rows: u64,
    pub next_row_id: u64,
    pub has_primary_key: bool,
    pub primary_key_column: Option<String>,
    pub auto_increment: HashMap<String, i64>,
    pub created_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    pub estimated_size_bytes: u64,
}

impl TableMetadata {
    pub fn new(table_name: impl Into<String>, columns: Vec<Column>) -> Self {
        let now = Utc::now();
        let has_primary_key = columns.iter().any(|c| c.primary_key);
        let primary_key_column = columns
            .iter()
            .find(|c| c.primary_key)
            .map(|c| c.name.clone());
        let auto_increment = columns
            .iter()
            .filter(|c| c.auto_increment)
            .map(|c| (c.name.clone(), 1i64))
            .collect();

        Self {
            table_name: table_name.into(),
            columns,
            total_rows: 0,
            next_row_id: 0,
            has_primary_key,
            primary_key_column,
            auto_increment,
            created_at: now,
            last_modified_at: now,
            estimated_size_bytes: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_modified_at = Utc::now();
    }

    /// Bumps the named auto-increment counter to `new_value.max(current)`,
    /// matching the insert rule in §4.4 step 1.
    pub fn bump_auto_increment(&mut self, column: &str, at_least: i64) {
        let entry = self.auto_increment.entry(column.to_string()).or_insert(1);
        *entry = (*entry).max(at_least);
    }

    pub fn schema(&self) -> common::Schema {
        common::Schema::new(self.columns.clone())
    }
}

fn metadata_path(table_dir: &Utf8Path, table_name: &str) -> camino::Utf8PathBuf {
    table_dir.join(format!("{table_name}_meta.json"))
}

/// Loads a table's metadata sidecar. Returns `Ok(None)` if the table has
/// no metadata file (i.e. does not exist).
pub fn load_metadata(
    metadata_dir: &Utf8Path,
    table_name: &str,
) -> Result<Option<TableMetadata>, StorageError> {
    let path = metadata_path(metadata_dir, table_name);
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(&path)?;
    let metadata: TableMetadata = serde_json::from_str(&contents)?;
    Ok(Some(metadata))
}

/// Persists a table's metadata sidecar via the temp-file-then-rename
/// primitive (§4.1.1), so a crash never leaves a half-written file.
pub fn save_metadata(metadata_dir: &Utf8Path, metadata: &TableMetadata) -> Result<(), StorageError> {
    fs::create_dir_all(metadata_dir)?;
    let path = metadata_path(metadata_dir, &metadata.table_name);
    let json = serde_json::to_string_pretty(metadata)?;

    let mut temp = tempfile::NamedTempFile::new_in(metadata_dir)?;
    temp.write_all(json.as_bytes())?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    temp.persist(&path).map_err(|e| StorageError::Io(e.error))?;

    log::debug!("flushed metadata for table {}", metadata.table_name);
    Ok(())
}

pub fn delete_metadata(metadata_dir: &Utf8Path, table_name: &str) -> Result<(), StorageError> {
    let path = metadata_path(metadata_dir, table_name);
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Table name stems present in the metadata directory, derived from
/// `<table>_meta.json` filenames (§4.1 `listTables`).
pub fn list_table_names(metadata_dir: &Utf8Path) -> Result<Vec<String>, StorageError> {
    if !metadata_dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(metadata_dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if let Some(stem) = file_name.strip_suffix("_meta.json") {
            names.push(stem.to_string());
        }
    }
    names.sort();
    Ok(names)
}
