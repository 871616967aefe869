//! Scalar values flowing through filter expressions.

use std::fmt;

/// A tagged scalar: the result of evaluating a literal, an identifier, or
/// a predicate. `Null` stands for "unavailable" and propagates through
/// logical operators with SQL three-valued semantics.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl Value {
    /// Convenience constructor for text values.
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truth of this value in boolean context: nonzero number, nonempty
    /// text, true boolean. `Null` has no truth value.
    pub fn truth(&self) -> Option<bool> {
        match self {
            Value::Int(n) => Some(*n != 0),
            Value::Float(f) => Some(*f != 0.0),
            Value::Text(s) => Some(!s.is_empty()),
            Value::Bool(b) => Some(*b),
            Value::Null => None,
        }
    }

    /// Human-readable type tag used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bool(_) => "boolean",
            Value::Null => "null",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => Ok(()),
        }
    }
}
