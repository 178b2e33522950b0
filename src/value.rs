//! Helpers over the [`serde_json::Value`] instance model.
//!
//! JSON Schema compares numbers by mathematical value (`1` equals `1.0`),
//! which `Value`'s derived equality does not, so `enum`, `const` and
//! `uniqueItems` go through [`values_equal`].

use std::fmt::{self, Display};

use serde_json::{Number, Value};

/// The primitive types named by the `type` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonType {
    Null,
    Boolean,
    Object,
    Array,
    Number,
    String,
    Integer,
}

impl JsonType {
    /// Parses a `type` keyword entry.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "null" => Some(JsonType::Null),
            "boolean" => Some(JsonType::Boolean),
            "object" => Some(JsonType::Object),
            "array" => Some(JsonType::Array),
            "number" => Some(JsonType::Number),
            "string" => Some(JsonType::String),
            "integer" => Some(JsonType::Integer),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            JsonType::Null => "null",
            JsonType::Boolean => "boolean",
            JsonType::Object => "object",
            JsonType::Array => "array",
            JsonType::Number => "number",
            JsonType::String => "string",
            JsonType::Integer => "integer",
        }
    }

    /// Returns true if `value` is an instance of this type.
    ///
    /// `integer` accepts any number with a zero fractional part, so `1.0`
    /// is an integer. `number` accepts integers.
    pub fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (JsonType::Null, Value::Null) => true,
            (JsonType::Boolean, Value::Bool(_)) => true,
            (JsonType::Object, Value::Object(_)) => true,
            (JsonType::Array, Value::Array(_)) => true,
            (JsonType::Number, Value::Number(_)) => true,
            (JsonType::String, Value::String(_)) => true,
            (JsonType::Integer, Value::Number(n)) => is_integer(n),
            _ => false,
        }
    }
}

impl Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of types from a `type` keyword, either a single name or an array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSet(Vec<JsonType>);

impl TypeSet {
    /// Reads a `type` keyword value. Returns `None` for malformed values.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(name) => JsonType::from_name(name).map(|t| TypeSet(vec![t])),
            Value::Array(names) => names
                .iter()
                .map(|n| n.as_str().and_then(JsonType::from_name))
                .collect::<Option<Vec<_>>>()
                .map(TypeSet),
            _ => None,
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        self.0.iter().any(|t| t.matches(value))
    }

    pub fn is_union(&self) -> bool {
        self.0.len() > 1
    }

    pub fn types(&self) -> &[JsonType] {
        &self.0
    }
}

impl Display for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(|t| t.name()).collect();
        write!(f, "{}", names.join(", "))
    }
}

/// Returns the JSON type name of a value, as used in error messages.
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if is_integer(n) => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn is_integer(n: &Number) -> bool {
    if n.is_i64() || n.is_u64() {
        return true;
    }
    n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
}

/// Compares two numbers by mathematical value.
pub fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Deep equality where numbers compare by value.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

/// Renders a value for the `got` field of an error, truncating long text.
pub fn preview(value: &Value) -> String {
    const MAX: usize = 64;
    let text = value.to_string();
    if text.chars().count() <= MAX {
        text
    } else {
        let cut: String = text.chars().take(MAX).collect();
        format!("{}...", cut)
    }
}
