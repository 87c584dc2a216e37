//! Predicate evaluation (§4.6): three-tier comparison (null handling,
//! numeric promotion, case-insensitive string fallback) delegated to
//! `common::Value::compare`, with the null-propagation rule applied here.

use std::cmp::Ordering;

use common::{Row, Value, ValueOrdering};

use crate::ast::{ColumnRef, CmpOp, Operand, Predicate};

/// Resolves a column reference against whatever row shape the caller is
/// evaluating — a single table's row, or a joined pair of rows qualified
/// by table/alias name.
pub trait RowContext {
    fn resolve(&self, column: &ColumnRef) -> Option<Value>;
}

impl RowContext for Row {
    fn resolve(&self, column: &ColumnRef) -> Option<Value> {
        self.get(&column.name).cloned()
    }
}

fn resolve_operand(operand: &Operand, ctx: &dyn RowContext) -> Option<Value> {
    match operand {
        Operand::Column(c) => ctx.resolve(c),
        Operand::Literal(v) => Some(v.clone()),
        Operand::Len(c) => Some(Value::Long(ctx.resolve(c).unwrap_or(Value::Null).len_utf16())),
    }
}

/// Evaluates a predicate against a row context. Per §4.6 rule 1, a
/// comparison where either side is `NULL` (or unresolved, e.g. a missing
/// join column) is never true — only `IS NULL`/`IS NOT NULL` see through
/// nulls.
pub fn evaluate(predicate: &Predicate, ctx: &dyn RowContext) -> bool {
    match predicate {
        Predicate::True => true,
        Predicate::Not(inner) => !evaluate(inner, ctx),
        Predicate::And(a, b) => evaluate(a, ctx) && evaluate(b, ctx),
        Predicate::Or(a, b) => evaluate(a, ctx) || evaluate(b, ctx),
        Predicate::IsNull(operand) => resolve_operand(operand, ctx).map(|v| v.is_null()).unwrap_or(true),
        Predicate::IsNotNull(operand) => {
            !resolve_operand(operand, ctx).map(|v| v.is_null()).unwrap_or(true)
        }
        Predicate::Compare { left, op, right } => {
            let (Some(l), Some(r)) = (resolve_operand(left, ctx), resolve_operand(right, ctx)) else {
                return false;
            };
            if l.is_null() || r.is_null() {
                return false;
            }
            let ValueOrdering::Ordered(ord) = l.compare(&r);
            match op {
                CmpOp::Eq => ord == Ordering::Equal,
                CmpOp::NotEq => ord != Ordering::Equal,
                CmpOp::Lt => ord == Ordering::Less,
                CmpOp::LtEq => ord != Ordering::Greater,
                CmpOp::Gt => ord == Ordering::Greater,
                CmpOp::GtEq => ord != Ordering::Less,
            }
        }
    }
}
