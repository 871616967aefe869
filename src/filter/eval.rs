//! Expression evaluation with SQL three-valued logic.
//!
//! Comparison rules:
//!
//! - numeric vs numeric compares numerically (`Int` promotes to `Float`
//!   only when the other side is a `Float`);
//! - text vs text compares codepoint-wise, after a lowercase fold when
//!   either side is one of the case-insensitive identifiers (`name`,
//!   `path`, `ext`, `ext2`);
//! - a text literal against the `date`/`time` identifiers compares as a
//!   lexicographic prefix, so `date < "2020"` holds for any 2019-or-earlier
//!   mtime; the literal's shape is validated on first use and cached;
//! - `Null` on either side yields `Null`; incompatible types are an error.

use std::cmp::Ordering;
use std::sync::OnceLock;

use crate::error::EvalError;
use crate::filter::ast::{BetweenNode, CmpNode, CmpOp, Expr, InNode, IsNullNode, LikeNode, RlikeNode};
use crate::filter::value::Value;

/// Read-only attribute lookup for one candidate under test. `None` means
/// the attribute is unavailable; the evaluator treats it as `Null`.
pub trait Row {
    fn value(&self, name: &str) -> Option<Value>;
}

/// Identifiers whose text comparisons fold case.
pub(crate) fn folds_case(name: &str) -> bool {
    matches!(name, "name" | "path" | "ext" | "ext2")
}

/// A compiled predicate, ready to test rows. Immutable and shareable
/// across threads; the only interior state is the write-once regex cache
/// on pattern nodes.
#[derive(Debug)]
pub struct FilterExpression {
    root: Expr,
}

impl FilterExpression {
    pub(crate) fn new(root: Expr) -> Self {
        Self { root }
    }

    /// The underlying expression tree.
    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// Evaluate against a row. `Ok(None)` is SQL `Null`: neither a match
    /// nor an error.
    pub fn eval(&self, row: &dyn Row) -> Result<Option<bool>, EvalError> {
        Ok(eval_value(&self.root, row)?.truth())
    }

    /// Evaluate against a row, treating `Null` as no-match.
    pub fn matches(&self, row: &dyn Row) -> Result<bool, EvalError> {
        Ok(self.eval(row)? == Some(true))
    }
}

fn eval_value(expr: &Expr, row: &dyn Row) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Ident(name) => Ok(row.value(name).unwrap_or(Value::Null)),
        Expr::Not(inner) => Ok(match eval_value(inner, row)?.truth() {
            Some(b) => Value::Bool(!b),
            None => Value::Null,
        }),
        Expr::And(left, right) => {
            let l = eval_value(left, row)?.truth();
            if l == Some(false) {
                return Ok(Value::Bool(false));
            }
            let r = eval_value(right, row)?.truth();
            Ok(kleene_and(l, r))
        }
        Expr::Or(left, right) => {
            let l = eval_value(left, row)?.truth();
            if l == Some(true) {
                return Ok(Value::Bool(true));
            }
            let r = eval_value(right, row)?.truth();
            Ok(kleene_or(l, r))
        }
        Expr::Cmp(node) => eval_cmp(node, row),
        Expr::Like(node) => eval_like(node, row),
        Expr::Rlike(node) => eval_rlike(node, row),
        Expr::In(node) => eval_in(node, row),
        Expr::Between(node) => eval_between(node, row),
        Expr::IsNull(node) => eval_is_null(node, row),
    }
}

fn kleene_and(l: Option<bool>, r: Option<bool>) -> Value {
    match (l, r) {
        (Some(false), _) | (_, Some(false)) => Value::Bool(false),
        (Some(true), Some(true)) => Value::Bool(true),
        _ => Value::Null,
    }
}

fn kleene_or(l: Option<bool>, r: Option<bool>) -> Value {
    match (l, r) {
        (Some(true), _) | (_, Some(true)) => Value::Bool(true),
        (Some(false), Some(false)) => Value::Bool(false),
        _ => Value::Null,
    }
}

fn eval_cmp(node: &CmpNode, row: &dyn Row) -> Result<Value, EvalError> {
    let lv = eval_value(&node.left, row)?;
    let rv = eval_value(&node.right, row)?;
    cmp_typed(node.op, &node.left, &lv, &node.right, &rv, Some(&node.literal_check))
}

fn eval_like(node: &LikeNode, row: &dyn Row) -> Result<Value, EvalError> {
    match eval_value(&node.expr, row)? {
        Value::Null => Ok(Value::Null),
        Value::Text(s) => Ok(Value::Bool(node.compiled()?.is_match(&s))),
        other => Err(EvalError::TypeMismatch {
            op: "LIKE",
            left: other.type_name(),
            right: "text",
        }),
    }
}

fn eval_rlike(node: &RlikeNode, row: &dyn Row) -> Result<Value, EvalError> {
    match eval_value(&node.expr, row)? {
        Value::Null => Ok(Value::Null),
        Value::Text(s) => Ok(Value::Bool(node.compiled()?.is_match(&s))),
        other => Err(EvalError::TypeMismatch {
            op: "RLIKE",
            left: other.type_name(),
            right: "text",
        }),
    }
}

fn eval_in(node: &InNode, row: &dyn Row) -> Result<Value, EvalError> {
    let v = eval_value(&node.expr, row)?;
    if v.is_null() {
        return Ok(Value::Null);
    }
    let mut saw_null = false;
    for item in &node.items {
        let iv = eval_value(item, row)?;
        match cmp_typed(CmpOp::Eq, &node.expr, &v, item, &iv, None)? {
            Value::Bool(true) => return Ok(Value::Bool(true)),
            Value::Null => saw_null = true,
            _ => {}
        }
    }
    Ok(if saw_null {
        Value::Null
    } else {
        Value::Bool(false)
    })
}

// BETWEEN lo AND hi == (expr >= lo AND expr <= hi), inclusive on both
// ends; lo > hi therefore yields false.
fn eval_between(node: &BetweenNode, row: &dyn Row) -> Result<Value, EvalError> {
    let v = eval_value(&node.expr, row)?;
    let lov = eval_value(&node.lo, row)?;
    let ge = cmp_typed(CmpOp::Ge, &node.expr, &v, &node.lo, &lov, Some(&node.lo_check))?;
    if ge == Value::Bool(false) {
        return Ok(Value::Bool(false));
    }
    let hiv = eval_value(&node.hi, row)?;
    let le = cmp_typed(CmpOp::Le, &node.expr, &v, &node.hi, &hiv, Some(&node.hi_check))?;
    Ok(kleene_and(ge.truth(), le.truth()))
}

// IS NULL tests availability, so it never yields Null itself.
fn eval_is_null(node: &IsNullNode, row: &dyn Row) -> Result<Value, EvalError> {
    let v = eval_value(&node.expr, row)?;
    Ok(Value::Bool(v.is_null() != node.negated))
}

#[derive(Clone, Copy)]
enum Shape {
    Date,
    Time,
}

impl Shape {
    fn of_ident(name: &str) -> Option<Shape> {
        match name {
            "date" => Some(Shape::Date),
            "time" => Some(Shape::Time),
            _ => None,
        }
    }

    fn validates(self, literal: &str) -> bool {
        let masks: &[&str] = match self {
            Shape::Date => &["dddd", "dddd-dd", "dddd-dd-dd"],
            Shape::Time => &["dd:dd", "dd:dd:dd"],
        };
        masks.iter().any(|mask| matches_mask(literal, mask))
    }

    fn error(self, literal: &str) -> EvalError {
        match self {
            Shape::Date => EvalError::MalformedDate {
                literal: literal.to_string(),
            },
            Shape::Time => EvalError::MalformedTime {
                literal: literal.to_string(),
            },
        }
    }
}

fn matches_mask(s: &str, mask: &str) -> bool {
    s.len() == mask.len()
        && s.bytes().zip(mask.bytes()).all(|(b, m)| {
            if m == b'd' {
                b.is_ascii_digit()
            } else {
                b == m
            }
        })
}

/// The (field side, shape, literal) triple when one side is the `date` or
/// `time` identifier and the other is a text literal.
fn prefix_pair<'a>(lnode: &Expr, rnode: &'a Expr) -> Option<(bool, Shape, &'a str)> {
    if let (Some(name), Some(lit)) = (lnode.ident_name(), rnode.text_literal()) {
        if let Some(shape) = Shape::of_ident(name) {
            return Some((true, shape, lit));
        }
    }
    None
}

fn prefix_pair_either<'a>(
    lnode: &'a Expr,
    rnode: &'a Expr,
) -> Option<(bool, Shape, &'a str)> {
    prefix_pair(lnode, rnode).or_else(|| {
        prefix_pair(rnode, lnode).map(|(_, shape, lit)| (false, shape, lit))
    })
}

/// Typed comparison of two already-evaluated operands. `literal_check` is
/// the node's cache for date/time literal validation; `None` disables the
/// prefix-compare special case (used by IN, which is plain equality).
fn cmp_typed(
    op: CmpOp,
    lnode: &Expr,
    lv: &Value,
    rnode: &Expr,
    rv: &Value,
    literal_check: Option<&OnceLock<bool>>,
) -> Result<Value, EvalError> {
    if lv.is_null() || rv.is_null() {
        return Ok(Value::Null);
    }

    if let Some(check) = literal_check {
        if let Some((field_left, shape, lit)) = prefix_pair_either(lnode, rnode) {
            let valid = *check.get_or_init(|| shape.validates(lit));
            if !valid {
                return Err(shape.error(lit));
            }
            if let (Value::Text(l), Value::Text(r)) = (lv, rv) {
                let (field, lit_text) = if field_left { (l, r) } else { (r, l) };
                let prefix = field.get(..lit_text.len()).unwrap_or(field.as_str());
                let ord = if field_left {
                    prefix.cmp(lit_text.as_str())
                } else {
                    lit_text.as_str().cmp(prefix)
                };
                return Ok(Value::Bool(apply_ord(op, ord)));
            }
        }
    }

    let fold = lnode.ident_name().is_some_and(folds_case)
        || rnode.ident_name().is_some_and(folds_case);
    compare_values(op, lv, rv, fold).map(Value::Bool)
}

fn apply_ord(op: CmpOp, ord: Ordering) -> bool {
    match op {
        CmpOp::Eq => ord == Ordering::Equal,
        CmpOp::Ne => ord != Ordering::Equal,
        CmpOp::Lt => ord == Ordering::Less,
        CmpOp::Le => ord != Ordering::Greater,
        CmpOp::Gt => ord == Ordering::Greater,
        CmpOp::Ge => ord != Ordering::Less,
    }
}

fn compare_values(op: CmpOp, lv: &Value, rv: &Value, fold: bool) -> Result<bool, EvalError> {
    use Value::*;

    let ord = match (lv, rv) {
        (Int(a), Int(b)) => a.cmp(b),
        (Int(a), Float(b)) => (*a as f64).total_cmp(b),
        (Float(a), Int(b)) => a.total_cmp(&(*b as f64)),
        (Float(a), Float(b)) => a.total_cmp(b),
        (Text(a), Text(b)) => {
            if fold {
                a.to_lowercase().cmp(&b.to_lowercase())
            } else {
                a.cmp(b)
            }
        }
        (Bool(a), Bool(b)) => {
            return match op {
                CmpOp::Eq => Ok(a == b),
                CmpOp::Ne => Ok(a != b),
                _ => Err(EvalError::TypeMismatch {
                    op: op.symbol(),
                    left: lv.type_name(),
                    right: rv.type_name(),
                }),
            }
        }
        _ => {
            return Err(EvalError::TypeMismatch {
                op: op.symbol(),
                left: lv.type_name(),
                right: rv.type_name(),
            })
        }
    };
    Ok(apply_ord(op, ord))
}
