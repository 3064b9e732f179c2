use indexmap::IndexMap;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sql::SqlQuerySpec;

/// A host-side constant value.
///
/// Constants appear in the expression tree either because the caller put them
/// there (captured variables, literals) or because constant folding replaced a
/// closed sub-expression with its evaluated result.
///
/// # Examples
///
/// ```
/// use docql::Value;
/// use indexmap::IndexMap;
///
/// let price = Value::Integer(100);
/// let title = Value::String("Z".to_string());
///
/// let mut closure = IndexMap::new();
/// closure.insert("threshold".to_string(), Value::Integer(10));
/// let captured = Value::Object(closure);
/// # let _ = (price, title, captured);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Null reference or empty nullable
    Null,

    /// Boolean (true/false)
    Boolean(bool),

    /// Signed integer of any host width
    Integer(i64),

    /// Unsigned 64-bit integer; values above `i64::MAX` translate as doubles
    UInteger(u64),

    /// Floating-point number
    Float(f64),

    /// Exact decimal number
    Decimal(Decimal),

    /// Single character, translated as a one-character string
    Char(char),

    /// UTF-8 string
    String(String),

    /// Globally unique identifier, translated as its hyphenated string form
    Guid(Uuid),

    /// In-memory sequence (arrays, lists, captured collections)
    Array(Vec<Value>),

    /// Record with named members, such as a captured closure or a host object
    Object(IndexMap<String, Value>),

    /// Spatial value holding its GeoJSON-equivalent structure
    Geometry(serde_json::Value),

    /// Prebuilt query text with its parameters
    QuerySpec(SqlQuerySpec),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as integer, only for values that hold a whole number
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::UInteger(n) => i64::try_from(*n).ok(),
            Value::Decimal(d) if d.fract().is_zero() => d.to_i64(),
            _ => None,
        }
    }

    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::UInteger(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    /// Human-readable type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::UInteger(_) => "unsigned integer",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Guid(_) => "guid",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Geometry(_) => "geometry",
            Value::QuerySpec(_) => "query spec",
        }
    }

    /// Converts to the JSON shape used for parameter bindings and wire documents.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::Number((*i).into()),
            Value::UInteger(u) => serde_json::Value::Number((*u).into()),
            Value::Float(f) => float_to_json(*f),
            Value::Decimal(d) => match d.to_i64() {
                Some(i) if d.fract().is_zero() => serde_json::Value::Number(i.into()),
                _ => float_to_json(d.to_f64().unwrap_or(f64::NAN)),
            },
            Value::Char(c) => serde_json::Value::String(c.to_string()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Guid(g) => serde_json::Value::String(g.to_string()),
            Value::Array(arr) => serde_json::Value::Array(arr.iter().map(Value::to_json).collect()),
            Value::Object(obj) => serde_json::Value::Object(
                obj.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Geometry(g) => g.clone(),
            Value::QuerySpec(spec) => serde_json::to_value(spec).unwrap_or(serde_json::Value::Null),
        }
    }
}

fn float_to_json(f: f64) -> serde_json::Value {
    serde_json::Number::from_f64(f)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
