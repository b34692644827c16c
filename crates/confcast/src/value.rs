use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar kinds a variable can be asserted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Bool,
    Int,
    Float,
    Text,
}

/// Tagged scalar carried by the wire, the stores and the client.
///
/// The untagged serde representation maps straight onto the JSON bootstrap
/// document: `null`, booleans, integral numbers, other numbers and strings.
/// A `Null` value in a bulk write is a deletion marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn kind(&self) -> Option<Kind> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(Kind::Bool),
            Value::Int(_) => Some(Kind::Int),
            Value::Float(_) => Some(Kind::Float),
            Value::Text(_) => Some(Kind::Text),
        }
    }

    /// Coerce a raw textual value into the requested kind.
    ///
    /// Handlers that only hold text (the OS environment) use this to turn a
    /// hit into a typed value. Already-typed values pass through untouched;
    /// a failed parse returns `None` and counts as a miss.
    pub fn coerce(self, kind: Kind) -> Option<Value> {
        let Value::Text(s) = self else {
            return Some(self);
        };
        match kind {
            Kind::Bool => s.parse::<bool>().ok().map(Value::Bool),
            Kind::Int => s.parse::<i64>().ok().map(Value::Int),
            Kind::Float => s.parse::<f64>().ok().map(Value::Float),
            Kind::Text => Some(Value::Text(s)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}
