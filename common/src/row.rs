use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::value::{ColumnType, Value};

/// The hidden row-id field synthesized for tables without a primary key
/// (§3). Never shown unless explicitly projected.
pub const HIDDEN_ROW_ID: &str = "__row_id";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            primary_key: false,
            auto_increment: false,
        }
    }
}

/// A table's column list plus a name→index lookup, built once and shared
/// (`Arc`) across every row of the table so per-row column lookups don't
/// allocate (ground: the teacher's pattern of indexing a `HashMap` keyed
/// by a stable id rather than re-deriving it per access, e.g.
/// `SyncEngine::file_map`).
#[derive(Clone, Debug)]
pub struct Schema {
    inner: Arc<SchemaInner>,
}

#[derive(Debug)]
struct SchemaInner {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    has_primary_key: bool,
    primary_key_column: Option<String>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        let primary_key_column = columns.iter().find(|c| c.primary_key).map(|c| c.name.clone());
        let has_primary_key = primary_key_column.is_some();
        Self {
            inner: Arc::new(SchemaInner {
                columns,
                index,
                has_primary_key,
                primary_key_column,
            }),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.inner.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.inner.index.get(name).copied()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|i| &self.inner.columns[i])
    }

    pub fn has_primary_key(&self) -> bool {
        self.inner.has_primary_key
    }

    pub fn primary_key_column(&self) -> Option<&str> {
        self.inner.primary_key_column.as_deref()
    }

    pub fn auto_increment_columns(&self) -> impl Iterator<Item = &Column> {
        self.inner.columns.iter().filter(|c| c.auto_increment)
    }
}

/// An ordered row, keyed by column name. Holds `HIDDEN_ROW_ID` as a
/// regular field when present; callers strip it at the output boundary
/// (§4.4) unless it was explicitly projected.
#[derive(Clone, Debug, Default)]
pub struct Row {
    fields: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            fields: Vec::with_capacity(cap),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if let Some(entry) = self.fields.iter_mut().find(|(n, _)| n == &name) {
            entry.1 = value;
        } else {
            self.fields.push((name, value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let idx = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Produces a copy with the hidden row-id field removed, used when
    /// shaping output rows unless `__row_id` was explicitly projected.
    pub fn without_hidden_row_id(&self) -> Row {
        let mut row = self.clone();
        row.remove(HIDDEN_ROW_ID);
        row
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_indexes_columns_by_name() {
        let schema = Schema::new(vec![
            Column::new("id", ColumnType::Integer),
            Column::new("name", ColumnType::Text),
        ]);
        assert_eq!(schema.column_index("name"), Some(1));
        assert_eq!(schema.column_index("missing"), None);
    }

    #[test]
    fn row_set_overwrites_existing_field() {
        let mut row = Row::new();
        row.set("a", Value::Integer(1));
        row.set("a", Value::Integer(2));
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("a"), Some(&Value::Integer(2)));
    }

    #[test]
    fn without_hidden_row_id_strips_only_that_field() {
        let mut row = Row::new();
        row.set("id", Value::Integer(1));
        row.set(HIDDEN_ROW_ID, Value::Long(7));
        let stripped = row.without_hidden_row_id();
        assert_eq!(stripped.len(), 1);
        assert!(stripped.get(HIDDEN_ROW_ID).is_none());
    }
}
