//! Join execution and the projection/ordering/limit pipeline a `SELECT`
//! runs its matched rows through (§4.7). Joins are plain nested-loop
//! Cartesian products filtered by the `ON` predicate — this dialect has
//! no indexes to plan around.

use std::cmp::Ordering;

use common::{Row, Value, HIDDEN_ROW_ID};
use sql::{ColumnRef, JoinClause, JoinKind, OrderBy, Predicate, Projection, RowContext, SelectColumn};

/// A row produced midway through join execution: one `Row` per
/// table/alias still attached to its qualifying name, so later `ON`/
/// `WHERE` predicates and `ORDER BY` clauses can resolve qualified
/// columns even if the final projection doesn't select them.
#[derive(Clone)]
pub struct JoinedRow {
    parts: Vec<(String, Row)>,
}

impl JoinedRow {
    pub fn single(alias: impl Into<String>, row: Row) -> Self {
        Self {
            parts: vec![(alias.into(), row)],
        }
    }

    fn extended(&self, alias: impl Into<String>, row: Row) -> Self {
        let mut parts = self.parts.clone();
        parts.push((alias.into(), row));
        Self { parts }
    }
}

impl RowContext for JoinedRow {
    fn resolve(&self, column: &ColumnRef) -> Option<Value> {
        match &column.table {
            Some(table) => self
                .parts
                .iter()
                .find(|(alias, _)| alias == table)
                .and_then(|(_, row)| row.get(&column.name).cloned()),
            None => self.parts.iter().find_map(|(_, row)| row.get(&column.name).cloned()),
        }
    }
}

/// Runs the base rows through every `JOIN` clause in order, producing the
/// Cartesian-product-then-filter result for each step (§4.7).
pub fn run_joins(
    base: Vec<JoinedRow>,
    joins: &[JoinClause],
    mut fetch_table: impl FnMut(&str) -> Result<Vec<Row>, crate::EngineError>,
) -> Result<Vec<JoinedRow>, crate::EngineError> {
    let mut current = base;
    for join in joins {
        let alias = join.table.effective_name().to_string();
        let candidates = fetch_table(&join.table.name)?;
        let mut next = Vec::new();

        for left in &current {
            let mut matched = false;
            for candidate in &candidates {
                let joined = left.extended(alias.clone(), candidate.clone());
                if sql::evaluate(&join.on, &joined) {
                    matched = true;
                    next.push(joined);
                }
            }
            if !matched && join.kind == JoinKind::Left {
                let mut empty = Row::new();
                empty.set(HIDDEN_ROW_ID, Value::Null);
                next.push(left.extended(alias.clone(), empty));
            }
        }

        current = next;
    }
    Ok(current)
}

pub fn filter_rows(rows: Vec<JoinedRow>, predicate: &Option<Predicate>) -> Vec<JoinedRow> {
    match predicate {
        Some(p) => rows.into_iter().filter(|r| sql::evaluate(p, r)).collect(),
        None => rows,
    }
}

/// Flattens a joined row into a single output `Row`, stripping the hidden
/// row id. Without a join, `Projection::All` yields unqualified columns
/// in declared order; with one or more joins, it yields the union of
/// every table's columns in left-then-right order, each qualified as
/// `table.column`, so two joined tables sharing a column name never
/// collide (§4.7).
pub fn project(joined: &JoinedRow, projection: &Projection) -> Row {
    match projection {
        Projection::All | Projection::Count => {
            let qualify = joined.parts.len() > 1;
            let mut out = Row::new();
            for (alias, row) in &joined.parts {
                for (name, value) in row.iter() {
                    if name == HIDDEN_ROW_ID {
                        continue;
                    }
                    if qualify {
                        out.set(format!("{alias}.{name}"), value.clone());
                    } else {
                        out.set(name, value.clone());
                    }
                }
            }
            out
        }
        Projection::Columns(columns) => {
            let mut out = Row::new();
            for column in columns {
                match column {
                    SelectColumn::Column(column) => {
                        let value = joined.resolve(column).unwrap_or(Value::Null);
                        out.set(column.name.clone(), value);
                    }
                    SelectColumn::Len(column) => {
                        let len = joined.resolve(column).unwrap_or(Value::Null).len_utf16();
                        out.set(format!("LEN({})", column.name), Value::Long(len));
                    }
                }
            }
            out
        }
    }
}

fn is_absent_or_null(value: &Option<Value>) -> bool {
    value.as_ref().map(Value::is_null).unwrap_or(true)
}

pub fn sort_rows(rows: &mut [JoinedRow], order_by: &Option<OrderBy>) {
    let Some(order_by) = order_by else { return };
    rows.sort_by(|a, b| {
        let av = a.resolve(&order_by.column);
        let bv = b.resolve(&order_by.column);
        let ord = if is_absent_or_null(&av) && is_absent_or_null(&bv) {
            Ordering::Equal
        } else if is_absent_or_null(&av) {
            Ordering::Less
        } else if is_absent_or_null(&bv) {
            Ordering::Greater
        } else {
            match av.unwrap().compare(&bv.unwrap()) {
                common::ValueOrdering::Ordered(ord) => ord,
            }
        };
        if order_by.descending {
            ord.reverse()
        } else {
            ord
        }
    });
}

pub fn apply_limit(mut rows: Vec<JoinedRow>, limit: Option<u64>) -> Vec<JoinedRow> {
    if let Some(limit) = limit {
        rows.truncate(limit as usize);
    }
    rows
}
