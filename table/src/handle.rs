//! A live handle onto one table: its schema, its cached metadata, and the
//! row operations layered over [`storage::StorageManager`] (§4.4).

use std::sync::Arc;

use common::{Row, Schema, Value, HIDDEN_ROW_ID};
use storage::{RowAction, StorageManager, TableMetadata};

use crate::coerce::coerce_value;
use crate::TableError;

/// Tracks whether a handle's in-memory metadata still matches what is
/// durably on disk. Row *data* is always durable the moment `insert`
/// returns (`append_row` fsyncs); this only governs how eagerly the JSON
/// counters (`total_rows`, `next_row_id`, auto-increment state) get
/// flushed, per `EngineConfig::metadata_flush_interval`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleState {
    Loaded,
    Modified,
    Flushed,
}

pub struct TableHandle {
    storage: Arc<StorageManager>,
    database: String,
    schema: Schema,
    metadata: TableMetadata,
    state: HandleState,
    dirty_inserts: usize,
    flush_interval: usize,
}

impl TableHandle {
    pub fn open(
        storage: Arc<StorageManager>,
        database: impl Into<String>,
        table: &str,
        flush_interval: usize,
    ) -> Result<TableHandle, TableError> {
        let database = database.into();
        // Repairs `total_rows` against the on-disk chunk contents before
        // handing out the handle, per the startup repair pass.
        let metadata = storage.repair_metadata(&database, table)?;
        let schema = metadata.schema();
        Ok(TableHandle {
            storage,
            database,
            schema,
            metadata,
            state: HandleState::Loaded,
            dirty_inserts: 0,
            flush_interval,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn table_name(&self) -> &str {
        &self.metadata.table_name
    }

    fn column_or_err(&self, name: &str) -> Result<&common::Column, TableError> {
        self.schema
            .column(name)
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))
    }

    /// Persists the in-memory metadata counters if they've drifted from
    /// disk, unconditionally.
    pub fn flush(&mut self) -> Result<(), TableError> {
        if self.state != HandleState::Flushed {
            self.storage.save_metadata(&self.database, &self.metadata)?;
            self.state = HandleState::Flushed;
            self.dirty_inserts = 0;
        }
        Ok(())
    }

    /// Validates and coerces a caller-supplied row against the schema,
    /// assigns auto-increment and hidden row-id fields, appends it
    /// durably, and returns the stored row shape (including `__row_id`
    /// when synthesized). Primary-key values are taken on trust: per
    /// §3's invariant they are unique by contract, not by a scan here.
    pub fn insert(&mut self, input: Row) -> Result<Row, TableError> {
        let mut row = Row::with_capacity(self.schema.columns().len());

        for column in self.schema.columns().to_vec() {
            let supplied = input.get(&column.name).cloned();

            let value = if column.auto_increment {
                let absent_or_null = supplied.as_ref().map(Value::is_null).unwrap_or(true);
                if absent_or_null {
                    let next = *self.metadata.auto_increment.get(&column.name).unwrap_or(&1);
                    self.metadata.bump_auto_increment(&column.name, next + 1);
                    Value::Long(next)
                } else {
                    let coerced = coerce_value(&supplied.unwrap(), &column)?;
                    let v = coerced.as_i64().ok_or_else(|| TableError::TypeMismatch {
                        column: column.name.clone(),
                        expected: "integer".to_string(),
                        found: coerced.kind_name().to_string(),
                    })?;
                    if v < 1 {
                        return Err(TableError::InvalidAutoIncrementValue {
                            column: column.name.clone(),
                            value: v,
                        });
                    }
                    self.metadata.bump_auto_increment(&column.name, v + 1);
                    coerced
                }
            } else {
                let raw = supplied.unwrap_or(Value::Null);
                if raw.is_null() && !column.nullable {
                    return Err(TableError::NotNullViolation {
                        column: column.name.clone(),
                    });
                }
                coerce_value(&raw, &column)?
            };

            row.set(column.name.clone(), value);
        }

        if self.metadata.primary_key_column.is_none() {
            row.set(HIDDEN_ROW_ID, Value::Long(self.metadata.next_row_id as i64));
            self.metadata.next_row_id += 1;
        }

        self.storage
            .append_row(&self.database, &self.metadata.table_name, &self.schema, &row)?;
        self.metadata.total_rows += 1;
        self.metadata.touch();
        self.state = HandleState::Modified;
        self.dirty_inserts += 1;

        if self.dirty_inserts >= self.flush_interval {
            self.flush()?;
        }

        Ok(row)
    }

    /// Lazily streams every row through `predicate`, returning matches.
    /// Materializes the result (callers needing a true streaming view
    /// should use [`TableHandle::stream`] directly).
    pub fn scan(&self, predicate: impl Fn(&Row) -> bool) -> Result<Vec<Row>, TableError> {
        let mut matches = Vec::new();
        for row in self.stream()? {
            let row = row?;
            if predicate(&row) {
                matches.push(row);
            }
        }
        Ok(matches)
    }

    /// The underlying lazy row stream, for callers (the `engine` crate's
    /// join/projection pipeline) that want to avoid materializing a whole
    /// table.
    pub fn stream(&self) -> Result<storage::RowStream, TableError> {
        Ok(self
            .storage
            .read_rows(&self.database, &self.metadata.table_name, self.schema.clone())?)
    }

    pub fn count(&self, predicate: impl Fn(&Row) -> bool) -> Result<u64, TableError> {
        let mut count = 0u64;
        for row in self.stream()? {
            if predicate(&row?) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Updates every row matching `predicate` by applying `set` (already
    /// column-name-keyed), coercing each new value, in a single rewrite
    /// pass (§4.1). Returns the number of rows updated.
    pub fn update(
        &mut self,
        predicate: impl Fn(&Row) -> bool,
        set: &[(String, Value)],
    ) -> Result<u64, TableError> {
        for (name, _) in set {
            self.column_or_err(name)?;
        }

        let schema = self.schema.clone();
        let mut coerce_err = None;
        let touched = self.storage.process_rows_batch(
            &self.database,
            &self.metadata.table_name,
            &schema,
            &mut self.metadata,
            |row| {
                if coerce_err.is_some() || !predicate(row) {
                    return RowAction::Keep;
                }
                let mut updated = row.clone();
                for (name, value) in set {
                    let column = schema.column(name).expect("validated above");
                    match coerce_value(value, column) {
                        Ok(coerced) => updated.set(name.clone(), coerced),
                        Err(e) => {
                            coerce_err = Some(e);
                            return RowAction::Keep;
                        }
                    }
                }
                RowAction::Replace(updated)
            },
        )?;

        if let Some(e) = coerce_err {
            return Err(e);
        }

        self.state = HandleState::Flushed;
        self.dirty_inserts = 0;
        Ok(touched)
    }

    pub fn delete(&mut self, predicate: impl Fn(&Row) -> bool) -> Result<u64, TableError> {
        let schema = self.schema.clone();
        let touched = self.storage.process_rows_batch(
            &self.database,
            &self.metadata.table_name,
            &schema,
            &mut self.metadata,
            |row| {
                if predicate(row) {
                    RowAction::Delete
                } else {
                    RowAction::Keep
                }
            },
        )?;
        self.state = HandleState::Flushed;
        self.dirty_inserts = 0;
        Ok(touched)
    }
}

impl Drop for TableHandle {
    fn drop(&mut self) {
        if self.state == HandleState::Modified {
            if let Err(e) = self.storage.save_metadata(&self.database, &self.metadata) {
                log::warn!(
                    "failed to flush metadata for {}/{} on drop: {e}",
                    self.database,
                    self.metadata.table_name
                );
            }
        }
    }
}
