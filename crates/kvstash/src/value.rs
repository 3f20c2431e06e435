//! Dynamically-typed decoded values.

use crate::entry::Primitive;

/// A value decoded from its tag alone.
///
/// Scalars keep their declared width. Structured payloads come back as
/// generic JSON with every number widened to `f64`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint(u64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    String(String),
    /// Sequence, map or record.
    Structured(serde_json::Value),
}

impl Value {
    /// The primitive this value was tagged with, if scalar.
    pub fn primitive(&self) -> Option<Primitive> {
        Some(match self {
            Value::Int(_) => Primitive::Int,
            Value::Int8(_) => Primitive::Int8,
            Value::Int16(_) => Primitive::Int16,
            Value::Int32(_) => Primitive::Int32,
            Value::Int64(_) => Primitive::Int64,
            Value::Uint(_) => Primitive::Uint,
            Value::Uint8(_) => Primitive::Uint8,
            Value::Uint16(_) => Primitive::Uint16,
            Value::Uint32(_) => Primitive::Uint32,
            Value::Uint64(_) => Primitive::Uint64,
            Value::Float32(_) => Primitive::Float32,
            Value::Float64(_) => Primitive::Float64,
            Value::Bool(_) => Primitive::Bool,
            Value::String(_) => Primitive::String,
            Value::Structured(_) => return None,
        })
    }

    /// Try to get the value as an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) | Value::Int64(v) => Some(v),
            Value::Int8(v) => Some(v as i64),
            Value::Int16(v) => Some(v as i64),
            Value::Int32(v) => Some(v as i64),
            Value::Uint8(v) => Some(v as i64),
            Value::Uint16(v) => Some(v as i64),
            Value::Uint32(v) => Some(v as i64),
            Value::Uint(v) | Value::Uint64(v) => i64::try_from(v).ok(),
            Value::Float32(v) => Some(v as i64),
            Value::Float64(v) => Some(v as i64),
            _ => None,
        }
    }

    /// Try to get the value as an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            Value::Uint(v) | Value::Uint64(v) => Some(*v as f64),
            Value::Structured(json) => json.as_f64(),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Try to get the value as a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get the value as a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get the structured JSON.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Structured(json) => Some(json),
            _ => None,
        }
    }

    /// Consume into structured JSON, if structured.
    pub fn into_json(self) -> Option<serde_json::Value> {
        match self {
            Value::Structured(json) => Some(json),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

value_from! {
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
    f32 => Float32,
    f64 => Float64,
    bool => Bool,
    String => String,
    serde_json::Value => Structured,
}

impl From<isize> for Value {
    fn from(v: isize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Uint(v as u64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

/// Rewrite every number in `json` as a float.
pub(crate) fn widen_numbers(json: &mut serde_json::Value) {
    match json {
        serde_json::Value::Number(n) => {
            if let Some(f) = n.as_f64().and_then(serde_json::Number::from_f64) {
                *n = f;
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(widen_numbers),
        serde_json::Value::Object(map) => map.values_mut().for_each(widen_numbers),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_conversions() {
        assert_eq!(Value::from(1i32), Value::Int32(1));
        assert_eq!(Value::from(1isize), Value::Int(1));
        assert_eq!(Value::from(7usize), Value::Uint(7));
        assert_eq!(Value::from("abc"), Value::String("abc".into()));
        assert_eq!(Value::from(json!([1])), Value::Structured(json!([1])));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::Uint8(3).as_i64(), Some(3));
        assert_eq!(Value::Int32(3).as_f64(), Some(3.0));
        assert_eq!(Value::Float64(1.5).as_f64(), Some(1.5));
        assert_eq!(Value::Uint64(u64::MAX).as_i64(), None);
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::String("x".into()).as_str(), Some("x"));
        assert_eq!(Value::Int(1).as_str(), None);
        assert_eq!(Value::Structured(json!({"a": 1})).as_json(), Some(&json!({"a": 1})));
    }

    #[test]
    fn test_primitive() {
        assert_eq!(Value::Float32(1.0).primitive(), Some(Primitive::Float32));
        assert_eq!(Value::Structured(json!(null)).primitive(), None);
    }

    #[test]
    fn test_widen_numbers() {
        let mut v = json!({"a": 1, "b": [2, {"c": 3}], "d": "4"});
        widen_numbers(&mut v);
        assert_eq!(v, json!({"a": 1.0, "b": [2.0, {"c": 3.0}], "d": "4"}));
        assert_ne!(v, json!({"a": 1, "b": [2, {"c": 3}], "d": "4"}));
    }
}
