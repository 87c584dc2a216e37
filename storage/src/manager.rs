//! The storage manager (C1): owns the on-disk layout — one directory per
//! database, one subdirectory of numbered chunk files per table, and a
//! JSON metadata sidecar alongside — and the chunked append/read/rewrite
//! operations layered over the row codec (§4.1).

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader};

use camino::{Utf8Path, Utf8PathBuf};
use common::{Row, Schema};

use crate::codec::{decode_row, encode_row, resync, DecodedRow};
use crate::metadata::{self, TableMetadata};
use crate::StorageError;

/// What to do with a row visited during a batch rewrite (§4.1, the fused
/// update/delete pass).
pub enum RowAction {
    Keep,
    Replace(Row),
    Delete,
}

#[derive(Clone, Debug)]
pub struct StorageManager {
    base_dir: Utf8PathBuf,
    chunk_size: usize,
}

impl StorageManager {
    pub fn new(base_dir: Utf8PathBuf, chunk_size: usize) -> Self {
        Self { base_dir, chunk_size }
    }

    pub fn base_dir(&self) -> &Utf8Path {
        &self.base_dir
    }

    fn database_dir(&self, database: &str) -> Utf8PathBuf {
        self.base_dir.join(database)
    }

    fn table_dir(&self, database: &str, table: &str) -> Utf8PathBuf {
        self.database_dir(database).join(table)
    }

    fn chunk_path(&self, database: &str, table: &str, chunk_index: usize) -> Utf8PathBuf {
        self.table_dir(database, table)
            .join(format!("chunk_{chunk_index:06}.dat"))
    }

    // --- database / table lifecycle -------------------------------------

    pub fn create_database(&self, database: &str) -> Result<(), StorageError> {
        fs::create_dir_all(self.database_dir(database))?;
        log::info!("created database {database}");
        Ok(())
    }

    pub fn delete_database(&self, database: &str) -> Result<(), StorageError> {
        let dir = self.database_dir(database);
        if !dir.exists() {
            return Err(StorageError::DatabaseNotFound(database.to_string()));
        }
        fs::remove_dir_all(&dir)?;
        log::info!("deleted database {database}");
        Ok(())
    }

    pub fn list_databases(&self) -> Result<Vec<String>, StorageError> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn list_tables(&self, database: &str) -> Result<Vec<String>, StorageError> {
        metadata::list_table_names(&self.database_dir(database))
    }

    pub fn create_table(
        &self,
        database: &str,
        table_metadata: &TableMetadata,
    ) -> Result<(), StorageError> {
        let table_dir = self.table_dir(database, &table_metadata.table_name);
        if table_dir.exists() {
            return Err(StorageError::TableAlreadyExists {
                database: database.to_string(),
                table: table_metadata.table_name.clone(),
            });
        }
        fs::create_dir_all(&table_dir)?;
        metadata::save_metadata(&self.database_dir(database), table_metadata)?;
        log::info!("created table {}/{}", database, table_metadata.table_name);
        Ok(())
    }

    pub fn drop_table(&self, database: &str, table: &str) -> Result<(), StorageError> {
        let table_dir = self.table_dir(database, table);
        if !table_dir.exists() {
            return Err(StorageError::TableNotFound {
                database: database.to_string(),
                table: table.to_string(),
            });
        }
        fs::remove_dir_all(&table_dir)?;
        metadata::delete_metadata(&self.database_dir(database), table)?;
        log::info!("dropped table {database}/{table}");
        Ok(())
    }

    pub fn load_metadata(&self, database: &str, table: &str) -> Result<TableMetadata, StorageError> {
        metadata::load_metadata(&self.database_dir(database), table)?.ok_or_else(|| {
            StorageError::TableNotFound {
                database: database.to_string(),
                table: table.to_string(),
            }
        })
    }

    pub fn save_metadata(&self, database: &str, table_metadata: &TableMetadata) -> Result<(), StorageError> {
        metadata::save_metadata(&self.database_dir(database), table_metadata)
    }

    // --- chunk enumeration ------------------------------------------------

    fn list_chunk_paths(&self, database: &str, table: &str) -> Result<Vec<Utf8PathBuf>, StorageError> {
        let dir = self.table_dir(database, table);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let os_name = entry.file_name();
            let Some(name) = os_name.to_str() else {
                continue;
            };
            if name.starts_with("chunk_") && name.ends_with(".dat") {
                paths.push(dir.join(name));
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn next_chunk_index(&self, chunks: &[Utf8PathBuf]) -> usize {
        chunks
            .iter()
            .filter_map(|p| p.file_stem())
            .filter_map(|stem| stem.strip_prefix("chunk_"))
            .filter_map(|n| n.parse::<usize>().ok())
            .max()
            .map(|n| n + 1)
            .unwrap_or(0)
    }

    fn count_rows_in_file(&self, path: &Utf8Path, schema: &Schema) -> Result<u64, StorageError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut count = 0u64;
        loop {
            match decode_row(&mut reader, schema)? {
                DecodedRow::Row(_) => count += 1,
                DecodedRow::Eof => break,
                DecodedRow::Corrupt(detail) => {
                    log::warn!("corrupt row while counting {path}: {detail}");
                    resync(&mut reader)?;
                }
            }
        }
        Ok(count)
    }

    // --- append / read ------------------------------------------------

    /// Appends a single row to the table's most recent chunk, rolling over
    /// to a fresh chunk once the current one reaches `chunk_size` rows.
    pub fn append_row(&self, database: &str, table: &str, schema: &Schema, row: &Row) -> Result<(), StorageError> {
        let chunks = self.list_chunk_paths(database, table)?;

        let path = match chunks.last() {
            Some(last) if self.count_rows_in_file(last, schema)? < self.chunk_size as u64 => last.clone(),
            _ => self.chunk_path(database, table, self.next_chunk_index(&chunks)),
        };

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        encode_row(&mut file, schema, row)?;
        file.sync_all()?;
        log::debug!("appended row to {path}");
        Ok(())
    }

    /// Opens a lazy, chunk-by-chunk stream over every row currently stored
    /// for a table, in insertion order. Corruption within a chunk is
    /// logged and skipped via resync rather than aborting the scan (§5).
    pub fn read_rows(&self, database: &str, table: &str, schema: Schema) -> Result<RowStream, StorageError> {
        let chunks = self.list_chunk_paths(database, table)?;
        Ok(RowStream {
            chunk_paths: chunks.into(),
            reader: None,
            schema,
        })
    }

    /// Same as [`StorageManager::read_rows`], narrowed to the `[skip,
    /// skip+take)` window of insertion order, for callers paging through a
    /// table without materializing it.
    pub fn read_rows_paginated(
        &self,
        database: &str,
        table: &str,
        schema: Schema,
        skip: u64,
        take: u64,
    ) -> Result<impl Iterator<Item = Result<Row, StorageError>>, StorageError> {
        Ok(self
            .read_rows(database, table, schema)?
            .skip(skip as usize)
            .take(take as usize))
    }

    /// Recomputes `total_rows` from the chunk files on disk and repairs the
    /// metadata sidecar if it has drifted from reality, as can happen after
    /// an unclean shutdown mid-rewrite (§5).
    pub fn repair_metadata(&self, database: &str, table: &str) -> Result<TableMetadata, StorageError> {
        let mut table_metadata = self.load_metadata(database, table)?;
        let schema = table_metadata.schema();
        let mut actual_rows = 0u64;
        let mut actual_bytes = 0u64;
        for path in self.list_chunk_paths(database, table)? {
            actual_rows += self.count_rows_in_file(&path, &schema)?;
            actual_bytes += fs::metadata(&path)?.len();
        }
        if actual_rows != table_metadata.total_rows || actual_bytes != table_metadata.estimated_size_bytes {
            if actual_rows != table_metadata.total_rows {
                log::warn!(
                    "repairing {database}/{table}: recorded {} rows, found {actual_rows} on disk",
                    table_metadata.total_rows
                );
            }
            table_metadata.total_rows = actual_rows;
            table_metadata.estimated_size_bytes = actual_bytes;
            table_metadata.touch();
            self.save_metadata(database, &table_metadata)?;
        }
        Ok(table_metadata)
    }

    /// Runs every row of a table through `action_for` in a single pass,
    /// rewriting each chunk to a temp file and atomically replacing it (or
    /// deleting it if nothing survived) — the fused update/delete
    /// primitive described in §4.1. Returns the number of rows touched
    /// (updated or deleted).
    pub fn process_rows_batch<F>(
        &self,
        database: &str,
        table: &str,
        schema: &Schema,
        table_metadata: &mut TableMetadata,
        mut action_for: F,
    ) -> Result<u64, StorageError>
    where
        F: FnMut(&Row) -> RowAction,
    {
        let table_dir = self.table_dir(database, table);
        let mut touched = 0u64;
        let mut new_total = 0u64;

        for chunk_path in self.list_chunk_paths(database, table)? {
            let file = File::open(&chunk_path)?;
            let mut reader = BufReader::new(file);
            let mut temp = tempfile::NamedTempFile::new_in(&table_dir)?;
            let mut kept_any = false;

            loop {
                match decode_row(&mut reader, schema)? {
                    DecodedRow::Row(row) => match action_for(&row) {
                        RowAction::Keep => {
                            encode_row(temp.as_file_mut(), schema, &row)?;
                            kept_any = true;
                            new_total += 1;
                        }
                        RowAction::Replace(new_row) => {
                            encode_row(temp.as_file_mut(), schema, &new_row)?;
                            kept_any = true;
                            new_total += 1;
                            touched += 1;
                        }
                        RowAction::Delete => {
                            touched += 1;
                        }
                    },
                    DecodedRow::Eof => break,
                    DecodedRow::Corrupt(detail) => {
                        log::warn!("corrupt row during rewrite of {chunk_path}: {detail}");
                        resync(&mut reader)?;
                    }
                }
            }

            temp.as_file().sync_all()?;
            if kept_any {
                temp.persist(&chunk_path).map_err(|e| StorageError::Io(e.error))?;
            } else {
                drop(temp);
                fs::remove_file(&chunk_path)?;
            }
        }

        table_metadata.total_rows = new_total;
        table_metadata.touch();
        self.save_metadata(database, table_metadata)?;
        log::info!("rewrote {database}/{table}: {touched} rows touched, {new_total} remaining");
        Ok(touched)
    }
}

/// A lazy iterator over every row in a table, advancing across chunk
/// boundaries transparently.
pub struct RowStream {
    chunk_paths: VecDeque<Utf8PathBuf>,
    reader: Option<BufReader<File>>,
    schema: Schema,
}

impl RowStream {
    fn advance_chunk(&mut self) -> io::Result<bool> {
        match self.chunk_paths.pop_front() {
            Some(path) => {
                log::debug!("opened chunk {path} for read");
                self.reader = Some(BufReader::new(File::open(&path)?));
                Ok(true)
            }
            None => {
                self.reader = None;
                Ok(false)
            }
        }
    }
}

impl Iterator for RowStream {
    type Item = Result<Row, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.reader.is_none() {
                match self.advance_chunk() {
                    Ok(true) => continue,
                    Ok(false) => return None,
                    Err(e) => return Some(Err(e.into())),
                }
            }

            let reader = self.reader.as_mut().expect("just ensured Some");
            match decode_row(reader, &self.schema) {
                Ok(DecodedRow::Row(row)) => return Some(Ok(row)),
                Ok(DecodedRow::Eof) => match self.advance_chunk() {
                    Ok(true) => continue,
                    Ok(false) => return None,
                    Err(e) => return Some(Err(e.into())),
                },
                Ok(DecodedRow::Corrupt(detail)) => {
                    log::warn!("corrupt row, resyncing: {detail}");
                    let reader = self.reader.as_mut().expect("just ensured Some");
                    match resync(reader) {
                        Ok(_) => continue,
                        Err(e) => return Some(Err(e.into())),
                    }
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}
