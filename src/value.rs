//! Values returned by device reads.

use std::fmt;
use thiserror::Error;

/// A value read from a Brick or Bricklet.
///
/// Scalar reads return one of the scalar variants. Reads of values with
/// sub-values return a `List` whose shape matches the value's descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    /// Element `index` of a list value, `None` for scalars and out-of-range indexes.
    pub fn get(&self, index: usize) -> Option<&Value> {
        match self {
            Value::List(items) => items.get(index),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            // Whole floats keep their ".0" so they stay apart from integers
            Value::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            Value::Float(v) => write!(f, "{v}"),
            // Existing log files spell booleans this way
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Text(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// A failed device read.
///
/// The message ends up verbatim in the sentinel value written to the log,
/// so it should be short and human readable.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct ReadError(pub String);

impl ReadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
