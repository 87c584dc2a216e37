//! The statement and expression tree the parser produces (§4.5/§4.6).
//! Predicates are tagged enums, not boxed closures, so the `engine` crate
//! can inspect and re-evaluate them per joined row without re-parsing.

use common::{ColumnType, Value};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn unqualified(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: name.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Operand {
    Column(ColumnRef),
    Literal(Value),
    /// `LEN(col)`: the UTF-16 code-unit count of a column's string form.
    Len(ColumnRef),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Clone, Debug)]
pub enum Predicate {
    True,
    Compare {
        left: Operand,
        op: CmpOp,
        right: Operand,
    },
    IsNull(Operand),
    IsNotNull(Operand),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Clone, Debug)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn effective_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Clone, Debug)]
pub struct JoinClause {
    pub kind: JoinKind,
    pub table: TableRef,
    pub on: Predicate,
}

#[derive(Clone, Debug)]
pub enum SelectColumn {
    Column(ColumnRef),
    Len(ColumnRef),
}

#[derive(Clone, Debug)]
pub enum Projection {
    All,
    Columns(Vec<SelectColumn>),
    Count,
}

#[derive(Clone, Debug)]
pub struct OrderBy {
    pub column: ColumnRef,
    pub descending: bool,
}

#[derive(Clone, Debug)]
pub struct SelectStatement {
    pub projection: Projection,
    pub from: TableRef,
    pub joins: Vec<JoinClause>,
    pub where_clause: Option<Predicate>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
}

#[derive(Clone, Debug)]
pub struct CreateTableStatement {
    pub table: String,
    pub columns: Vec<ColumnDef>,
    pub if_not_exists: bool,
}

#[derive(Clone, Debug)]
pub struct InsertStatement {
    pub table: String,
    pub columns: Option<Vec<String>>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Clone, Debug)]
pub struct UpdateStatement {
    pub table: String,
    pub assignments: Vec<(String, Value)>,
    pub where_clause: Option<Predicate>,
}

#[derive(Clone, Debug)]
pub struct DeleteStatement {
    pub table: String,
    pub where_clause: Option<Predicate>,
}

#[derive(Clone, Debug)]
pub enum Statement {
    CreateDatabase(String),
    DropDatabase(String),
    UseDatabase(String),
    CreateTable(CreateTableStatement),
    DropTable(String),
    Insert(InsertStatement),
    Select(SelectStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    ShowDatabases,
    ShowTables,
}
