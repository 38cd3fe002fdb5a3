//! Property values: the open attribute model shared by nodes and edges.
//!
//! Every attribute that is not structural (id, category, subject, ...) lives
//! in a property bag. Set-valued properties are arrays.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A JSON-like value that can represent any property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Iterate the scalar members: the elements of an array, or the value itself.
    pub fn scalars(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            Value::Array(items) => Box::new(items.iter()),
            other => Box::new(std::iter::once(other)),
        }
    }

    /// Consume into scalar members, flattening one level of array.
    pub fn into_scalars(self) -> Vec<Value> {
        match self {
            Value::Array(items) => items,
            other => vec![other],
        }
    }

    /// Render a scalar as a plain string (`None` for null).
    ///
    /// Used wherever values are compared or written as text: filters,
    /// tabular cells, RDF literal lexical forms.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Merge `incoming` into `self`.
    ///
    /// If either side is set-valued the result is the ordered union;
    /// otherwise the incoming scalar overwrites.
    pub fn merge(&mut self, incoming: Value) {
        match (&mut *self, incoming) {
            (Value::Array(existing), incoming) => union_into(existing, incoming.into_scalars()),
            (current, Value::Array(items)) => {
                let mut merged = vec![std::mem::replace(current, Value::Null)];
                merged.retain(|v| !v.is_null());
                union_into(&mut merged, items);
                *current = Value::Array(merged);
            }
            (current, incoming) => *current = incoming,
        }
    }
}

fn union_into(target: &mut Vec<Value>, incoming: Vec<Value>) {
    for value in incoming {
        if !target.contains(&value) {
            target.push(value);
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str("|")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Object(obj) => {
                let json = serde_json::to_string(obj).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(arr: Vec<T>) -> Self {
        Value::Array(arr.into_iter().map(Into::into).collect())
    }
}

/// A bag of properties attached to a node or edge.
pub type Properties = IndexMap<String, Value>;

/// Extension trait for building and merging Properties.
pub trait PropertiesExt {
    fn with(self, key: impl Into<String>, value: impl Into<Value>) -> Self;

    /// Merge another bag into this one with [`Value::merge`] semantics.
    fn merge_from(&mut self, other: Properties);

    /// Add one more value under `key`, promoting to an array on repeat.
    fn push_value(&mut self, key: impl Into<String>, value: Value);
}

impl PropertiesExt for Properties {
    fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key.into(), value.into());
        self
    }

    fn merge_from(&mut self, other: Properties) {
        for (key, value) in other {
            match self.get_mut(&key) {
                Some(existing) => existing.merge(value),
                None => {
                    self.insert(key, value);
                }
            }
        }
    }

    fn push_value(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.get_mut(&key) {
            Some(existing) => existing.merge(Value::Array(vec![value])),
            None => {
                self.insert(key, value);
            }
        }
    }
}
