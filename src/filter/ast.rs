//! Typed expression tree for compiled predicates.
//!
//! The tree is built once per query and immutable thereafter; pattern
//! nodes carry a write-once regex cache, so a compiled expression can be
//! shared across threads.

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};

use crate::error::EvalError;
use crate::filter::value::Value;

/// Comparison operators of the dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// Whether a LIKE pattern matches case-sensitively. `ILIKE` always folds;
/// plain `LIKE` folds when its left side is one of the case-insensitive
/// identifiers (`name`, `path`, `ext`, `ext2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMode {
    Sensitive,
    Insensitive,
}

/// One node of a compiled predicate.
#[derive(Debug)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Cmp(CmpNode),
    Like(LikeNode),
    Rlike(RlikeNode),
    In(InNode),
    Between(BetweenNode),
    IsNull(IsNullNode),
}

impl Expr {
    /// The identifier name if this node is a bare identifier.
    pub fn ident_name(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// The text if this node is a text literal.
    pub fn text_literal(&self) -> Option<&str> {
        match self {
            Expr::Literal(Value::Text(s)) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct CmpNode {
    pub op: CmpOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    // date/time literal shape, validated on first use
    pub(crate) literal_check: OnceLock<bool>,
}

impl CmpNode {
    pub(crate) fn new(op: CmpOp, left: Expr, right: Expr) -> Self {
        Self {
            op,
            left: Box::new(left),
            right: Box::new(right),
            literal_check: OnceLock::new(),
        }
    }
}

#[derive(Debug)]
pub struct LikeNode {
    pub expr: Box<Expr>,
    pub pattern: String,
    pub case: CaseMode,
    regex: OnceLock<Result<Regex, regex::Error>>,
}

impl LikeNode {
    pub(crate) fn new(expr: Expr, pattern: String, case: CaseMode) -> Self {
        Self {
            expr: Box::new(expr),
            pattern,
            case,
            regex: OnceLock::new(),
        }
    }

    /// Translated pattern, compiled once and cached on the node.
    pub(crate) fn compiled(&self) -> Result<&Regex, EvalError> {
        self.regex
            .get_or_init(|| {
                RegexBuilder::new(&like_to_regex(&self.pattern))
                    .case_insensitive(self.case == CaseMode::Insensitive)
                    .build()
            })
            .as_ref()
            .map_err(|e| EvalError::BadPattern {
                pattern: self.pattern.clone(),
                reason: e.to_string(),
            })
    }
}

#[derive(Debug)]
pub struct RlikeNode {
    pub expr: Box<Expr>,
    pub pattern: String,
    regex: OnceLock<Result<Regex, regex::Error>>,
}

impl RlikeNode {
    pub(crate) fn new(expr: Expr, pattern: String) -> Self {
        Self {
            expr: Box::new(expr),
            pattern,
            regex: OnceLock::new(),
        }
    }

    /// The user regex, anchored at the start of the candidate text.
    pub(crate) fn compiled(&self) -> Result<&Regex, EvalError> {
        self.regex
            .get_or_init(|| Regex::new(&format!("^(?:{})", self.pattern)))
            .as_ref()
            .map_err(|e| EvalError::BadPattern {
                pattern: self.pattern.clone(),
                reason: e.to_string(),
            })
    }
}

#[derive(Debug)]
pub struct InNode {
    pub expr: Box<Expr>,
    pub items: Vec<Expr>,
}

impl InNode {
    pub(crate) fn new(expr: Expr, items: Vec<Expr>) -> Self {
        Self {
            expr: Box::new(expr),
            items,
        }
    }
}

#[derive(Debug)]
pub struct BetweenNode {
    pub expr: Box<Expr>,
    pub lo: Box<Expr>,
    pub hi: Box<Expr>,
    pub(crate) lo_check: OnceLock<bool>,
    pub(crate) hi_check: OnceLock<bool>,
}

impl BetweenNode {
    pub(crate) fn new(expr: Expr, lo: Expr, hi: Expr) -> Self {
        Self {
            expr: Box::new(expr),
            lo: Box::new(lo),
            hi: Box::new(hi),
            lo_check: OnceLock::new(),
            hi_check: OnceLock::new(),
        }
    }
}

#[derive(Debug)]
pub struct IsNullNode {
    pub expr: Box<Expr>,
    pub negated: bool,
}

impl IsNullNode {
    pub(crate) fn new(expr: Expr, negated: bool) -> Self {
        Self {
            expr: Box::new(expr),
            negated,
        }
    }
}

/// Translate a SQL LIKE pattern into an anchored regex: `%` becomes `.*`,
/// `_` becomes `.`, everything else matches literally.
pub(crate) fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut literal = String::new();
    out.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' | '_' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if ch == '%' { ".*" } else { "." });
            }
            other => literal.push(other),
        }
    }
    out.push_str(&regex::escape(&literal));
    out.push('$');
    out
}
