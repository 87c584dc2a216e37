//! Caches open [`TableHandle`]s keyed by `(database, table)` so repeated
//! statements against the same table reuse its schema and metadata
//! instead of reloading the sidecar every time (§4.4.1, the same idea
//! as the teacher's `skie-index` crate caching open file handles in a
//! `HashMap<FileID, SyncFile>` rather than reopening on every call).

use std::collections::HashMap;
use std::sync::Arc;

use storage::StorageManager;

use crate::{TableError, TableHandle};

pub struct TableRegistry {
    storage: Arc<StorageManager>,
    flush_interval: usize,
    handles: HashMap<(String, String), TableHandle>,
}

impl TableRegistry {
    pub fn new(storage: Arc<StorageManager>, flush_interval: usize) -> Self {
        Self {
            storage,
            flush_interval,
            handles: HashMap::new(),
        }
    }

    /// Returns a cached handle for `(database, table)`, opening and
    /// caching it on first use.
    pub fn get(&mut self, database: &str, table: &str) -> Result<&mut TableHandle, TableError> {
        let key = (database.to_string(), table.to_string());
        if !self.handles.contains_key(&key) {
            let handle = TableHandle::open(Arc::clone(&self.storage), database, table, self.flush_interval)?;
            self.handles.insert(key.clone(), handle);
        }
        Ok(self.handles.get_mut(&key).expect("just inserted"))
    }

    /// Evicts a cached handle, flushing its metadata first. Called after
    /// `DROP TABLE` so a stale schema can't be reused.
    pub fn evict(&mut self, database: &str, table: &str) -> Result<(), TableError> {
        let key = (database.to_string(), table.to_string());
        if let Some(mut handle) = self.handles.remove(&key) {
            handle.flush()?;
        }
        Ok(())
    }

    /// Evicts every handle belonging to a database. Called after `DROP
    /// DATABASE`.
    pub fn evict_database(&mut self, database: &str) {
        self.handles.retain(|(db, _), _| db != database);
    }

    pub fn flush_all(&mut self) -> Result<(), TableError> {
        for handle in self.handles.values_mut() {
            handle.flush()?;
        }
        Ok(())
    }
}
