//! The engine facade (C7): parses and dispatches statements, runs joins
//! and the projection/ordering/limit pipeline, and owns the
//! current-database context a session carries between statements (§4.7).

mod config;
mod error;
mod join;

pub use config::EngineConfig;
pub use error::EngineError;

use std::sync::Arc;

use common::Row;
use sql::{Predicate, Projection, Statement};
use storage::StorageManager;
use table::TableRegistry;

use join::JoinedRow;

/// The outcome of running one statement, as produced internally by the
/// dispatch methods before being flattened into a [`SqlResult`].
#[derive(Clone, Debug)]
enum ExecResult {
    Ack,
    RowsAffected(u64),
    Rows(Vec<Row>),
    Count(u64),
    Databases(Vec<String>),
    Tables(Vec<String>),
}

/// The one result shape every statement produces (§6): exactly one of the
/// tabular/list/message forms is populated. `execute` never returns `Err`;
/// failures surface as `success = false` with `error_message` set.
#[derive(Clone, Debug, Default)]
pub struct SqlResult {
    pub success: bool,
    pub message: String,
    pub error_message: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub rows_affected: i64,
    pub tables: Vec<String>,
    pub databases: Vec<String>,
}

impl SqlResult {
    fn ack(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Default::default()
        }
    }

    fn rows_affected(n: u64, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            rows_affected: n as i64,
            ..Default::default()
        }
    }

    fn rows(rows: Vec<Row>) -> Self {
        let columns = rows
            .first()
            .map(|r| r.columns().map(str::to_string).collect())
            .unwrap_or_default();
        Self {
            success: true,
            rows_affected: rows.len() as i64,
            columns,
            rows,
            ..Default::default()
        }
    }

    fn count(n: u64) -> Self {
        let mut row = Row::new();
        row.set("COUNT", common::Value::Long(n as i64));
        Self {
            success: true,
            columns: vec!["COUNT".to_string()],
            rows: vec![row],
            rows_affected: 1,
            ..Default::default()
        }
    }

    fn tables(names: Vec<String>) -> Self {
        Self {
            success: true,
            tables: names,
            ..Default::default()
        }
    }

    fn databases(names: Vec<String>) -> Self {
        Self {
            success: true,
            databases: names,
            ..Default::default()
        }
    }

    fn error(message: String) -> Self {
        Self {
            success: false,
            error_message: Some(message),
            ..Default::default()
        }
    }

    fn from_exec_result(result: ExecResult) -> Self {
        match result {
            ExecResult::Ack => SqlResult::ack("OK"),
            ExecResult::RowsAffected(n) => SqlResult::rows_affected(n, "OK"),
            ExecResult::Rows(rows) => SqlResult::rows(rows),
            ExecResult::Count(n) => SqlResult::count(n),
            ExecResult::Databases(names) => SqlResult::databases(names),
            ExecResult::Tables(names) => SqlResult::tables(names),
        }
    }
}

pub struct Engine {
    storage: Arc<StorageManager>,
    tables: TableRegistry,
    current_database: String,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let storage = Arc::new(StorageManager::new(config.base_dir, config.chunk_size));
        storage.create_database(common::DEFAULT_DATABASE)?;
        let tables = TableRegistry::new(Arc::clone(&storage), config.metadata_flush_interval);
        Ok(Self {
            storage,
            tables,
            current_database: common::DEFAULT_DATABASE.to_string(),
        })
    }

    pub fn current_database(&self) -> &str {
        &self.current_database
    }

    pub fn list_databases(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.storage.list_databases()?)
    }

    pub fn list_tables(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.storage.list_tables(&self.current_database)?)
    }

    pub fn statistics(&mut self, table: &str) -> Result<storage::TableMetadata, EngineError> {
        let database = self.current_database.clone();
        Ok(self.tables.get(&database, table)?.metadata().clone())
    }

    /// Resets the session's current database back to the always-present
    /// default, e.g. after the active database was dropped.
    pub fn clear_current_database(&mut self) {
        self.current_database = common::DEFAULT_DATABASE.to_string();
    }

    /// Parses and runs one statement. Infallible at the type level (§6):
    /// failures are reported through `SqlResult.success = false` rather
    /// than `Err`, so a collaborator never has to handle a `Result`.
    pub fn execute(&mut self, statement_text: &str) -> SqlResult {
        match self.execute_checked(statement_text) {
            Ok(result) => SqlResult::from_exec_result(result),
            Err(e) => e.to_sql_result(),
        }
    }

    fn execute_checked(&mut self, statement_text: &str) -> Result<ExecResult, EngineError> {
        let statement = sql::parse_statement(statement_text)?;
        match statement {
            Statement::CreateDatabase(name) => {
                self.storage.create_database(&name)?;
                Ok(ExecResult::Ack)
            }
            Statement::DropDatabase(name) => {
                self.tables.evict_database(&name);
                self.storage.delete_database(&name)?;
                if self.current_database == name {
                    self.clear_current_database();
                }
                Ok(ExecResult::Ack)
            }
            Statement::UseDatabase(name) => {
                if !self.storage.list_databases()?.iter().any(|db| db == &name) {
                    return Err(EngineError::DatabaseNotFound(name));
                }
                self.current_database = name;
                Ok(ExecResult::Ack)
            }
            Statement::CreateTable(create) => {
                let if_not_exists = create.if_not_exists;
                let columns = create
                    .columns
                    .into_iter()
                    .map(|c| common::Column {
                        name: c.name,
                        column_type: c.column_type,
                        nullable: c.nullable,
                        primary_key: c.primary_key,
                        auto_increment: c.auto_increment,
                    })
                    .collect();
                let metadata = storage::TableMetadata::new(create.table, columns);
                match self.storage.create_table(&self.current_database, &metadata) {
                    Ok(()) => {}
                    Err(storage::StorageError::TableAlreadyExists { .. }) if if_not_exists => {}
                    Err(e) => return Err(e.into()),
                }
                Ok(ExecResult::Ack)
            }
            Statement::DropTable(name) => {
                self.tables.evict(&self.current_database, &name)?;
                self.storage.drop_table(&self.current_database, &name)?;
                Ok(ExecResult::Ack)
            }
            Statement::Insert(insert) => self.execute_insert(insert),
            Statement::Select(select) => self.execute_select(select),
            Statement::Update(update) => self.execute_update(update),
            Statement::Delete(delete) => self.execute_delete(delete),
            Statement::ShowDatabases => Ok(ExecResult::Databases(self.storage.list_databases()?)),
            Statement::ShowTables => Ok(ExecResult::Tables(self.storage.list_tables(&self.current_database)?)),
        }
    }

    fn execute_insert(&mut self, insert: sql::InsertStatement) -> Result<ExecResult, EngineError> {
        let database = self.current_database.clone();
        let handle = self.tables.get(&database, &insert.table)?;
        let schema = handle.schema().clone();
        let mut inserted = 0u64;

        for values in insert.rows {
            let mut row = Row::new();
            match &insert.columns {
                Some(names) => {
                    for (name, value) in names.iter().zip(values) {
                        row.set(name.clone(), value);
                    }
                }
                None => {
                    for (column, value) in schema.columns().iter().zip(values) {
                        row.set(column.name.clone(), value);
                    }
                }
            }
            handle.insert(row)?;
            inserted += 1;
        }

        Ok(ExecResult::RowsAffected(inserted))
    }

    fn execute_update(&mut self, update: sql::UpdateStatement) -> Result<ExecResult, EngineError> {
        let database = self.current_database.clone();
        let handle = self.tables.get(&database, &update.table)?;
        let predicate = update.where_clause.unwrap_or(Predicate::True);
        let touched = handle.update(|row| sql::evaluate(&predicate, row), &update.assignments)?;
        Ok(ExecResult::RowsAffected(touched))
    }

    fn execute_delete(&mut self, delete: sql::DeleteStatement) -> Result<ExecResult, EngineError> {
        let database = self.current_database.clone();
        let handle = self.tables.get(&database, &delete.table)?;
        let predicate = delete.where_clause.unwrap_or(Predicate::True);
        let touched = handle.delete(|row| sql::evaluate(&predicate, row))?;
        Ok(ExecResult::RowsAffected(touched))
    }

    fn execute_select(&mut self, select: sql::SelectStatement) -> Result<ExecResult, EngineError> {
        let database = self.current_database.clone();

        if select.joins.is_empty() {
            let alias = select.from.effective_name().to_string();
            let predicate = select.where_clause.clone().unwrap_or(Predicate::True);
            let handle = self.tables.get(&database, &select.from.name)?;

            if matches!(select.projection, Projection::Count) {
                let count = handle.count(|row| sql::evaluate(&predicate, row))?;
                return Ok(ExecResult::Count(count));
            }

            let mut rows: Vec<JoinedRow> = handle
                .scan(|row| sql::evaluate(&predicate, row))?
                .into_iter()
                .map(|row| JoinedRow::single(alias.clone(), row))
                .collect();
            join::sort_rows(&mut rows, &select.order_by);
            let rows = join::apply_limit(rows, select.limit);
            let out = rows.iter().map(|r| join::project(r, &select.projection)).collect();
            return Ok(ExecResult::Rows(out));
        }

        let base_alias = select.from.effective_name().to_string();
        let base_rows: Vec<JoinedRow> = self
            .tables
            .get(&database, &select.from.name)?
            .scan(|_| true)?
            .into_iter()
            .map(|row| JoinedRow::single(base_alias.clone(), row))
            .collect();

        let tables = &mut self.tables;
        let joined = join::run_joins(base_rows, &select.joins, |table_name| {
            Ok(tables.get(&database, table_name)?.scan(|_| true)?)
        })?;

        let mut filtered = join::filter_rows(joined, &select.where_clause);

        if matches!(select.projection, Projection::Count) {
            return Ok(ExecResult::Count(filtered.len() as u64));
        }

        join::sort_rows(&mut filtered, &select.order_by);
        let limited = join::apply_limit(filtered, select.limit);
        let out = limited.iter().map(|r| join::project(r, &select.projection)).collect();
        Ok(ExecResult::Rows(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn engine() -> (tempfile::TempDir, Engine) {
        let dir = tempfile::tempdir().unwrap();
        let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let engine = Engine::new(EngineConfig::new(base)).unwrap();
        (dir, engine)
    }

    #[test]
    fn creates_table_inserts_and_selects() {
        let (_guard, mut engine) = engine();
        engine.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)");
        engine.execute("INSERT INTO users (id, name) VALUES (1, 'Ada'), (2, 'Bea')");

        let result = engine.execute("SELECT * FROM users WHERE id = 2");
        assert!(result.success);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].get("name"), Some(&common::Value::Text("Bea".into())));
    }

    #[test]
    fn count_star_matches_predicate() {
        let (_guard, mut engine) = engine();
        engine.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)");
        engine.execute("INSERT INTO users (id) VALUES (1), (2), (3)");

        let result = engine.execute("SELECT COUNT(*) FROM users WHERE id > 1");
        assert_eq!(result.columns, vec!["COUNT".to_string()]);
        assert_eq!(result.rows[0].get("COUNT"), Some(&common::Value::Long(2)));
    }

    #[test]
    fn update_and_delete_mutate_rows() {
        let (_guard, mut engine) = engine();
        engine.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)");
        engine.execute("INSERT INTO users (id, name) VALUES (1, 'Ada')");

        let updated = engine.execute("UPDATE users SET name = 'Ada Lovelace' WHERE id = 1");
        assert_eq!(updated.rows_affected, 1);

        let result = engine.execute("SELECT * FROM users");
        assert_eq!(result.rows[0].get("name"), Some(&common::Value::Text("Ada Lovelace".into())));

        let deleted = engine.execute("DELETE FROM users WHERE id = 1");
        assert_eq!(deleted.rows_affected, 1);

        let count = engine.execute("SELECT COUNT(*) FROM users");
        assert_eq!(count.rows[0].get("COUNT"), Some(&common::Value::Long(0)));
    }

    #[test]
    fn inner_join_matches_across_tables() {
        let (_guard, mut engine) = engine();
        engine.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)");
        engine.execute("CREATE TABLE orders (id INTEGER PRIMARY KEY, user_id INTEGER, total INTEGER)");
        engine.execute("INSERT INTO users (id, name) VALUES (1, 'Ada')");
        engine.execute("INSERT INTO orders (id, user_id, total) VALUES (10, 1, 99)");

        let result =
            engine.execute("SELECT u.name, o.total FROM users u INNER JOIN orders o ON u.id = o.user_id");
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].get("name"), Some(&common::Value::Text("Ada".into())));
        assert_eq!(result.rows[0].get("total"), Some(&common::Value::Integer(99)));
    }

    #[test]
    fn left_join_keeps_unmatched_left_rows() {
        let (_guard, mut engine) = engine();
        engine.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)");
        engine.execute("CREATE TABLE orders (id INTEGER PRIMARY KEY, user_id INTEGER)");
        engine.execute("INSERT INTO users (id, name) VALUES (1, 'Ada')");

        let result = engine.execute("SELECT u.name FROM users u LEFT JOIN orders o ON u.id = o.user_id");
        assert_eq!(result.rows.len(), 1);
    }

    #[test]
    fn use_unknown_database_is_rejected() {
        let (_guard, mut engine) = engine();
        let result = engine.execute("USE nope");
        assert!(!result.success);
        assert!(result.error_message.is_some());
    }

    #[test]
    fn create_table_if_not_exists_is_idempotent() {
        let (_guard, mut engine) = engine();
        let first = engine.execute("CREATE TABLE users (id INTEGER PRIMARY KEY)");
        assert!(first.success);
        let second = engine.execute("CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY)");
        assert!(second.success);
        let without_guard = engine.execute("CREATE TABLE users (id INTEGER PRIMARY KEY)");
        assert!(!without_guard.success);
    }

    #[test]
    fn len_projection_and_predicate_measure_string_length() {
        let (_guard, mut engine) = engine();
        engine.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)");
        engine.execute("INSERT INTO users (id, name) VALUES (1, 'Ada'), (2, 'Bea')");

        let result = engine.execute("SELECT LEN(name) FROM users WHERE id = 1");
        assert_eq!(result.rows[0].get("LEN(name)"), Some(&common::Value::Long(3)));
    }
}
