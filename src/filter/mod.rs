//! Filter expressions: `field op value` parsing and per-record evaluation.

pub mod glob;

use anyhow::{bail, Result};
use std::cmp::Ordering;

use crate::record::Record;
use crate::value;

/// Comparison operator in a filter expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Glob,
}

/// Operators in split-scan order: two-byte tokens first so they win over
/// their one-byte prefixes at the same position.
const OPS: [(&str, Op); 7] = [
    ("!=", Op::Ne),
    ("<=", Op::Le),
    (">=", Op::Ge),
    ("=", Op::Eq),
    ("~", Op::Glob),
    ("<", Op::Lt),
    (">", Op::Gt),
];

impl Op {
    /// Whether this operator accepts the given ordering outcome. `None`
    /// is the incomparable case (NaN); only `!=` holds there.
    fn holds(self, ord: Option<Ordering>) -> bool {
        let Some(ord) = ord else {
            return self == Op::Ne;
        };
        match self {
            Op::Eq => ord == Ordering::Equal,
            Op::Ne => ord != Ordering::Equal,
            Op::Lt => ord == Ordering::Less,
            Op::Le => ord != Ordering::Greater,
            Op::Gt => ord == Ordering::Greater,
            Op::Ge => ord != Ordering::Less,
            Op::Glob => unreachable!("glob has no ordering"),
        }
    }
}

/// A parsed filter expression, not yet bound to a column index.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpr {
    pub column: String,
    pub op: Op,
    pub value: String,
    pub value_num: Option<f64>,
}

/// Split `field op value` at the first occurrence of the longest matching
/// operator. Whitespace around the operator is trimmed from both sides;
/// the field name cannot be empty.
pub fn parse(expr: &str) -> Result<FilterExpr> {
    let mut best: Option<(usize, &str, Op)> = None;
    for (token, op) in OPS {
        if let Some(idx) = expr.find(token) {
            if best.is_none_or(|(b, _, _)| idx < b) {
                best = Some((idx, token, op));
            }
        }
    }
    let Some((idx, token, op)) = best else {
        bail!("invalid filter (no operator): {expr}");
    };
    let column = expr[..idx].trim_end();
    if column.is_empty() {
        bail!("invalid filter (empty field name): {expr}");
    }
    let val = expr[idx + token.len()..].trim_start();
    Ok(FilterExpr {
        column: column.to_string(),
        op,
        value: val.to_string(),
        value_num: val.parse::<f64>().ok(),
    })
}

impl FilterExpr {
    /// Bind the expression to a resolved column index.
    pub fn bind(&self, col: usize) -> Predicate {
        Predicate {
            col,
            op: self.op,
            value: self.value.clone().into_bytes(),
            value_num: self.value_num,
        }
    }
}

/// A filter expression bound to a column index, ready for evaluation.
#[derive(Debug, Clone)]
pub struct Predicate {
    col: usize,
    op: Op,
    value: Vec<u8>,
    value_num: Option<f64>,
}

impl Predicate {
    /// Evaluate against one record. A column index past the end of the
    /// record is false. Once the right-hand side is numeric, a field that
    /// doesn't parse as a number is a mismatch, not a string fallback.
    pub fn matches(&self, rec: &Record) -> bool {
        let Some(field) = rec.field(self.col) else {
            return false;
        };
        match self.op {
            Op::Glob => glob::glob_match(&self.value, field),
            _ => {
                if let Some(rhs) = self.value_num {
                    match value::parse_num(field) {
                        Some(lhs) => self.op.holds(lhs.partial_cmp(&rhs)),
                        None => false,
                    }
                } else {
                    self.op.holds(Some(field.cmp(&self.value[..])))
                }
            }
        }
    }
}

/// True iff every predicate holds. An empty set passes trivially.
pub fn matches_all(predicates: &[Predicate], rec: &Record) -> bool {
    predicates.iter().all(|p| p.matches(rec))
}
