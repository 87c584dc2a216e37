//! The SQL front end (C5 tokenizer/parser, C6 predicate evaluator): turns
//! a statement string into a typed [`ast::Statement`] and evaluates its
//! `WHERE`/`ON` predicates against rows (§4.5, §4.6).

mod ast;
mod error;
mod parser;
mod predicate;
mod token;

pub use ast::{
    CmpOp, ColumnDef, ColumnRef, CreateTableStatement, DeleteStatement, InsertStatement, JoinClause,
    JoinKind, Operand, OrderBy, Predicate, Projection, SelectColumn, SelectStatement, Statement,
    TableRef, UpdateStatement,
};
pub use error::ParseError;
pub use parser::parse_statement;
pub use predicate::{evaluate, RowContext};
pub use token::{tokenize, Token};
