//! Type-tagging codec.
//!
//! `encode` turns a value into `"<type-tag>##<payload>"`: scalars use their
//! textual form, sequences/maps/records use JSON. `decode` reverses it into a
//! destination type that declares up front which tags it accepts.
//!
//! ```rust,ignore
//! assert_eq!(encode(&true)?, "bool##true");
//! assert_eq!(encode(&vec![1.1, 2.2])?, "[]float64##[1.1,2.2]");
//!
//! // Tag-only decoding widens structured numbers to floats.
//! let v: Value = decode("[2]uint8##[1,2]")?;
//! assert_eq!(v, Value::Structured(json!([1.0, 2.0])));
//!
//! // A typed destination keeps the original width.
//! let bytes: [u8; 2] = decode("[2]uint8##[1,2]")?;
//! ```

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::rc::Rc;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use crate::entry::{self, Entry, Primitive, TypeTag};
use crate::json::json_payload;
use crate::value::{widen_numbers, Value};
use crate::CacheError;

/// Static type name used when a type appears inside a composite tag.
pub trait TypeName {
    /// Canonical name, e.g. `int32`, `[]string`, `map[string]float64`.
    fn type_name() -> Cow<'static, str>;
}

/// Values that can be written as an encoded entry.
pub trait ToEntry {
    /// Tag for this value.
    fn tag(&self) -> Cow<'static, str>;

    /// Payload for this value.
    fn payload(&self) -> Result<String, CacheError>;
}

/// Shape a destination type accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Any tag; decoded from the tag alone.
    Any,
    /// `bool` tags.
    Bool,
    /// Integer and float tags.
    Number,
    /// `string` and unrecognised tags.
    Text,
    /// Sequence, map and record tags.
    Structured,
    /// A named record: structured tags plus its own tag, whatever its
    /// JSON form (newtypes, unit-variant enums).
    Record(&'static str),
}

impl Shape {
    /// Whether a destination of this shape can be decoded from `tag`.
    pub fn accepts(&self, tag: &TypeTag) -> bool {
        match (self, tag) {
            (Shape::Any, _) => true,
            (Shape::Bool, TypeTag::Primitive(Primitive::Bool)) => true,
            (Shape::Number, TypeTag::Primitive(p)) => p.is_numeric(),
            (Shape::Text, TypeTag::Primitive(Primitive::String) | TypeTag::Other(_)) => true,
            (Shape::Structured | Shape::Record(_), TypeTag::Structured(_)) => true,
            (Shape::Record(name), tag) => tag.name() == *name,
            _ => false,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Shape::Any => "any",
            Shape::Bool => "bool",
            Shape::Number => "number",
            Shape::Text => "string",
            Shape::Structured => "structured",
            Shape::Record(name) => *name,
        }
    }
}

/// Destination types an entry can be decoded into.
pub trait FromEntry: Sized {
    /// Tags this type can be decoded from.
    fn shape() -> Shape;

    /// Decode a payload whose tag was accepted by `shape()`.
    fn from_payload(tag: &TypeTag, payload: &str) -> Result<Self, CacheError>;

    /// Fallback for stored strings that carry no tag.
    fn from_raw(_raw: &str) -> Option<Self> {
        None
    }
}

/// Encode a value as `"<type-tag>##<payload>"`.
pub fn encode<T: ToEntry + ?Sized>(value: &T) -> Result<String, CacheError> {
    let payload = value.payload()?;
    Ok(entry::join(&value.tag(), &payload))
}

/// Decode an entry into `T`.
///
/// Strings without a tag go through `T::from_raw`; `Value` and `String`
/// return them unchanged.
pub fn decode<T: FromEntry>(compressed: &str) -> Result<T, CacheError> {
    let Some(entry) = Entry::parse(compressed) else {
        return T::from_raw(compressed)
            .ok_or_else(|| CacheError::DecodeError(format!("missing type tag in `{compressed}`")));
    };
    let tag = entry.type_tag();
    let shape = T::shape();
    if !shape.accepts(&tag) {
        return Err(CacheError::TypeMismatch {
            expected: shape.describe(),
            found: tag.name().to_string(),
        });
    }
    T::from_payload(&tag, entry.payload())
}

fn from_json<T: DeserializeOwned>(payload: &str) -> Result<T, CacheError> {
    serde_json::from_str(payload).map_err(|e| CacheError::DecodeError(e.to_string()))
}

fn parse_scalar<T>(p: Primitive, payload: &str) -> Result<T, CacheError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    payload
        .parse()
        .map_err(|e| CacheError::DecodeError(format!("{p} `{payload}`: {e}")))
}

// Scalars

macro_rules! scalar {
    ($($ty:ty => $prim:ident, $shape:ident);* $(;)?) => {
        $(
            impl TypeName for $ty {
                fn type_name() -> Cow<'static, str> {
                    Cow::Borrowed(Primitive::$prim.name())
                }
            }

            impl ToEntry for $ty {
                fn tag(&self) -> Cow<'static, str> {
                    Self::type_name()
                }

                fn payload(&self) -> Result<String, CacheError> {
                    Ok(self.to_string())
                }
            }

            impl FromEntry for $ty {
                fn shape() -> Shape {
                    Shape::$shape
                }

                fn from_payload(_tag: &TypeTag, payload: &str) -> Result<Self, CacheError> {
                    parse_scalar(Primitive::$prim, payload)
                }

                fn from_raw(raw: &str) -> Option<Self> {
                    raw.parse().ok()
                }
            }
        )*
    };
}

scalar! {
    isize => Int, Number;
    i8 => Int8, Number;
    i16 => Int16, Number;
    i32 => Int32, Number;
    i64 => Int64, Number;
    usize => Uint, Number;
    u8 => Uint8, Number;
    u16 => Uint16, Number;
    u32 => Uint32, Number;
    u64 => Uint64, Number;
    f32 => Float32, Number;
    f64 => Float64, Number;
    bool => Bool, Bool;
}

impl TypeName for String {
    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed(Primitive::String.name())
    }
}

impl TypeName for str {
    fn type_name() -> Cow<'static, str> {
        String::type_name()
    }
}

impl<T: TypeName + ?Sized> TypeName for &T {
    fn type_name() -> Cow<'static, str> {
        T::type_name()
    }
}

impl ToEntry for str {
    fn tag(&self) -> Cow<'static, str> {
        String::type_name()
    }

    fn payload(&self) -> Result<String, CacheError> {
        Ok(self.to_string())
    }
}

impl ToEntry for String {
    fn tag(&self) -> Cow<'static, str> {
        String::type_name()
    }

    fn payload(&self) -> Result<String, CacheError> {
        Ok(self.clone())
    }
}

impl FromEntry for String {
    fn shape() -> Shape {
        Shape::Text
    }

    fn from_payload(_tag: &TypeTag, payload: &str) -> Result<Self, CacheError> {
        Ok(payload.to_string())
    }

    fn from_raw(raw: &str) -> Option<Self> {
        Some(raw.to_string())
    }
}

// Indirection resolves to the pointee.

macro_rules! forward {
    ($($ptr:ident),*) => {
        $(
            impl<T: ToEntry + ?Sized> ToEntry for $ptr<T> {
                fn tag(&self) -> Cow<'static, str> {
                    (**self).tag()
                }

                fn payload(&self) -> Result<String, CacheError> {
                    (**self).payload()
                }
            }
        )*
    };
}

forward!(Box, Rc, Arc);

impl<T: ToEntry + ?Sized> ToEntry for &T {
    fn tag(&self) -> Cow<'static, str> {
        (**self).tag()
    }

    fn payload(&self) -> Result<String, CacheError> {
        (**self).payload()
    }
}

// Structured

impl<T: TypeName> TypeName for Vec<T> {
    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("[]{}", T::type_name()))
    }
}

impl<T: TypeName + Serialize> ToEntry for [T] {
    fn tag(&self) -> Cow<'static, str> {
        Vec::<T>::type_name()
    }

    fn payload(&self) -> Result<String, CacheError> {
        json_payload(self)
    }
}

impl<T: TypeName + Serialize> ToEntry for Vec<T> {
    fn tag(&self) -> Cow<'static, str> {
        Self::type_name()
    }

    fn payload(&self) -> Result<String, CacheError> {
        json_payload(self)
    }
}

impl<T: DeserializeOwned> FromEntry for Vec<T> {
    fn shape() -> Shape {
        Shape::Structured
    }

    fn from_payload(_tag: &TypeTag, payload: &str) -> Result<Self, CacheError> {
        from_json(payload)
    }
}

impl<T: TypeName, const N: usize> TypeName for [T; N] {
    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("[{N}]{}", T::type_name()))
    }
}

impl<T: TypeName, const N: usize> ToEntry for [T; N]
where
    [T; N]: Serialize,
{
    fn tag(&self) -> Cow<'static, str> {
        Self::type_name()
    }

    fn payload(&self) -> Result<String, CacheError> {
        json_payload(self)
    }
}

impl<T, const N: usize> FromEntry for [T; N]
where
    [T; N]: DeserializeOwned,
{
    fn shape() -> Shape {
        Shape::Structured
    }

    fn from_payload(_tag: &TypeTag, payload: &str) -> Result<Self, CacheError> {
        from_json(payload)
    }
}

macro_rules! map {
    ($($map:ident: $($bound:ident),*);*) => {
        $(
            impl<K: TypeName, V: TypeName> TypeName for $map<K, V> {
                fn type_name() -> Cow<'static, str> {
                    Cow::Owned(format!("map[{}]{}", K::type_name(), V::type_name()))
                }
            }

            impl<K, V> ToEntry for $map<K, V>
            where
                K: TypeName + Serialize,
                V: TypeName + Serialize,
            {
                fn tag(&self) -> Cow<'static, str> {
                    Self::type_name()
                }

                // Goes through `serde_json::Value` so keys come out sorted.
                fn payload(&self) -> Result<String, CacheError> {
                    let json = serde_json::to_value(self)
                        .map_err(|e| CacheError::EncodeError(e.to_string()))?;
                    json_payload(&json)
                }
            }

            impl<K, V> FromEntry for $map<K, V>
            where
                K: DeserializeOwned $(+ $bound)*,
                V: DeserializeOwned,
            {
                fn shape() -> Shape {
                    Shape::Structured
                }

                fn from_payload(_tag: &TypeTag, payload: &str) -> Result<Self, CacheError> {
                    from_json(payload)
                }
            }
        )*
    };
}

map! {
    HashMap: Eq, Hash;
    BTreeMap: Ord
}

macro_rules! tuple {
    ($($name:ident),+) => {
        impl<$($name: TypeName),+> TypeName for ($($name,)+) {
            fn type_name() -> Cow<'static, str> {
                let parts: Vec<Cow<'static, str>> = vec![$($name::type_name()),+];
                Cow::Owned(format!("({})", parts.join(", ")))
            }
        }

        impl<$($name: TypeName + Serialize),+> ToEntry for ($($name,)+) {
            fn tag(&self) -> Cow<'static, str> {
                Self::type_name()
            }

            fn payload(&self) -> Result<String, CacheError> {
                json_payload(self)
            }
        }

        impl<$($name: DeserializeOwned),+> FromEntry for ($($name,)+) {
            fn shape() -> Shape {
                Shape::Structured
            }

            fn from_payload(_tag: &TypeTag, payload: &str) -> Result<Self, CacheError> {
                from_json(payload)
            }
        }
    };
}

tuple!(A, B);
tuple!(A, B, C);
tuple!(A, B, C, D);

impl TypeName for serde_json::Value {
    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("interface {}")
    }
}

impl ToEntry for serde_json::Value {
    fn tag(&self) -> Cow<'static, str> {
        match self {
            serde_json::Value::Object(_) => Cow::Borrowed("map[string]interface {}"),
            serde_json::Value::Array(_) => Cow::Borrowed("[]interface {}"),
            _ => Self::type_name(),
        }
    }

    fn payload(&self) -> Result<String, CacheError> {
        json_payload(self)
    }
}

impl FromEntry for serde_json::Value {
    fn shape() -> Shape {
        Shape::Structured
    }

    fn from_payload(_tag: &TypeTag, payload: &str) -> Result<Self, CacheError> {
        from_json(payload)
    }
}

// Dynamic values

impl ToEntry for Value {
    fn tag(&self) -> Cow<'static, str> {
        match (self.primitive(), self) {
            (Some(p), _) => Cow::Borrowed(p.name()),
            (None, Value::Structured(json)) => json.tag(),
            (None, _) => Cow::Borrowed("interface {}"),
        }
    }

    fn payload(&self) -> Result<String, CacheError> {
        Ok(match self {
            Value::Int(v) | Value::Int64(v) => v.to_string(),
            Value::Int8(v) => v.to_string(),
            Value::Int16(v) => v.to_string(),
            Value::Int32(v) => v.to_string(),
            Value::Uint(v) | Value::Uint64(v) => v.to_string(),
            Value::Uint8(v) => v.to_string(),
            Value::Uint16(v) => v.to_string(),
            Value::Uint32(v) => v.to_string(),
            Value::Float32(v) => v.to_string(),
            Value::Float64(v) => v.to_string(),
            Value::Bool(v) => v.to_string(),
            Value::String(v) => v.clone(),
            Value::Structured(json) => return json.payload(),
        })
    }
}

impl FromEntry for Value {
    fn shape() -> Shape {
        Shape::Any
    }

    fn from_payload(tag: &TypeTag, payload: &str) -> Result<Self, CacheError> {
        let p = match tag {
            TypeTag::Primitive(p) => *p,
            TypeTag::Structured(_) => {
                let mut json: serde_json::Value = from_json(payload)?;
                widen_numbers(&mut json);
                return Ok(Value::Structured(json));
            }
            TypeTag::Other(_) => return Ok(Value::String(payload.to_string())),
        };
        Ok(match p {
            Primitive::Int => Value::Int(parse_scalar(p, payload)?),
            Primitive::Int8 => Value::Int8(parse_scalar(p, payload)?),
            Primitive::Int16 => Value::Int16(parse_scalar(p, payload)?),
            Primitive::Int32 => Value::Int32(parse_scalar(p, payload)?),
            Primitive::Int64 => Value::Int64(parse_scalar(p, payload)?),
            Primitive::Uint => Value::Uint(parse_scalar(p, payload)?),
            Primitive::Uint8 => Value::Uint8(parse_scalar(p, payload)?),
            Primitive::Uint16 => Value::Uint16(parse_scalar(p, payload)?),
            Primitive::Uint32 => Value::Uint32(parse_scalar(p, payload)?),
            Primitive::Uint64 => Value::Uint64(parse_scalar(p, payload)?),
            Primitive::Float32 => Value::Float32(parse_scalar(p, payload)?),
            Primitive::Float64 => Value::Float64(parse_scalar(p, payload)?),
            Primitive::Bool => Value::Bool(parse_scalar(p, payload)?),
            Primitive::String => Value::String(payload.to_string()),
        })
    }

    fn from_raw(raw: &str) -> Option<Self> {
        Some(Value::String(raw.to_string()))
    }
}

/// Implement the codec traits for named records.
///
/// The tag is the record's fully-qualified Rust path. The record must
/// derive `Serialize` and `Deserialize`.
///
/// ```rust,ignore
/// #[derive(Serialize, Deserialize)]
/// struct Cart { items: Vec<String> }
///
/// kvstash::cacheable_record!(Cart);
/// ```
#[macro_export]
macro_rules! cacheable_record {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::TypeName for $ty {
                fn type_name() -> ::std::borrow::Cow<'static, str> {
                    ::std::borrow::Cow::Borrowed(::std::any::type_name::<$ty>())
                }
            }

            impl $crate::ToEntry for $ty {
                fn tag(&self) -> ::std::borrow::Cow<'static, str> {
                    <$ty as $crate::TypeName>::type_name()
                }

                fn payload(&self) -> ::std::result::Result<String, $crate::CacheError> {
                    $crate::json_payload(self)
                }
            }

            impl $crate::FromEntry for $ty {
                fn shape() -> $crate::Shape {
                    $crate::Shape::Record(::std::any::type_name::<$ty>())
                }

                fn from_payload(
                    _tag: &$crate::TypeTag,
                    payload: &str,
                ) -> ::std::result::Result<Self, $crate::CacheError> {
                    $crate::__private::serde_json::from_str(payload)
                        .map_err(|e| $crate::CacheError::DecodeError(e.to_string()))
                }
            }
        )+
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct MyStruct {
        #[serde(rename = "Abc")]
        abc: i32,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Nested {
        #[serde(flatten)]
        inner: MyStruct,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct UserId(u64);

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    enum Status {
        Active,
        Suspended,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Marker;

    crate::cacheable_record!(MyStruct, Nested, UserId, Status, Marker);

    fn in_and_out<T: ToEntry + ?Sized>(value: &T) -> Value {
        decode(&encode(value).unwrap()).unwrap()
    }

    #[test]
    fn test_encode_scalars() {
        assert_eq!(encode("abc").unwrap(), "string##abc");
        assert_eq!(encode(&true).unwrap(), "bool##true");
        assert_eq!(encode(&1isize).unwrap(), "int##1");
        assert_eq!(encode(&1.2f64).unwrap(), "float64##1.2");
        assert_eq!(encode(&1usize).unwrap(), "uint##1");
        assert_eq!(encode(&1i64).unwrap(), "int64##1");
        assert_eq!(encode(&1f64).unwrap(), "float64##1");
        assert_eq!(encode(&1u8).unwrap(), "uint8##1");
    }

    #[test]
    fn test_encode_through_indirection() {
        let boxed: Box<i32> = Box::new(5);
        assert_eq!(encode(&boxed).unwrap(), "int32##5");
        let shared = Arc::new(String::from("x"));
        assert_eq!(encode(&shared).unwrap(), "string##x");
    }

    #[test]
    fn test_encode_arrays_and_slices() {
        assert_eq!(encode(&[1u8, 2]).unwrap(), "[2]uint8##[1,2]");
        assert_eq!(encode(&[[3isize, 4]]).unwrap(), "[1][2]int##[[3,4]]");
        assert_eq!(
            encode(&["a", "b", "c"].map(String::from)).unwrap(),
            r#"[3]string##["a","b","c"]"#
        );
        assert_eq!(encode(&vec![1.1f64, 2.2]).unwrap(), "[]float64##[1.1,2.2]");
        assert_eq!(encode(&[1i32, 2][..]).unwrap(), "[]int32##[1,2]");
    }

    #[test]
    fn test_encode_records() {
        let tag = std::any::type_name::<MyStruct>();
        assert_eq!(
            encode(&MyStruct { abc: 1 }).unwrap(),
            format!(r#"{tag}##{{"Abc":1}}"#)
        );
        let nested = Nested {
            inner: MyStruct { abc: 1 },
        };
        assert!(encode(&nested).unwrap().ends_with(r#"Nested##{"Abc":1}"#));
        assert_eq!(encode(&(1i32, String::from("a"))).unwrap(), r#"(int32, string)##[1,"a"]"#);
    }

    #[test]
    fn test_encode_maps() {
        let m: HashMap<String, String> = [("a".to_string(), "b".to_string())].into();
        assert_eq!(encode(&m).unwrap(), r#"map[string]string##{"a":"b"}"#);

        let m: HashMap<isize, String> = [(9, "b".to_string())].into();
        assert_eq!(encode(&m).unwrap(), r#"map[int]string##{"9":"b"}"#);

        let m = json!({"a": "b", "c": 1, "d": 2.1});
        assert_eq!(
            encode(&m).unwrap(),
            r#"map[string]interface {}##{"a":"b","c":1,"d":2.1}"#
        );
    }

    #[test]
    fn test_map_keys_sorted() {
        let m: HashMap<String, i32> = (0..20).map(|i| (format!("k{i:02}"), i)).collect();
        let encoded = encode(&m).unwrap();
        let expected: BTreeMap<String, i32> = m.into_iter().collect();
        assert_eq!(encoded, format!("map[string]int32##{}", serde_json::to_string(&expected).unwrap()));
    }

    #[test]
    fn test_decode_scalars_keep_type() {
        assert_eq!(in_and_out("abc"), Value::String("abc".into()));
        assert_eq!(in_and_out(&true), Value::Bool(true));
        assert_eq!(in_and_out(&1isize), Value::Int(1));
        assert_eq!(in_and_out(&1.2f64), Value::Float64(1.2));
        assert_eq!(in_and_out(&1usize), Value::Uint(1));
        assert_eq!(in_and_out(&1i64), Value::Int64(1));
        assert_eq!(in_and_out(&1f64), Value::Float64(1.0));
        assert_eq!(in_and_out(&1u8), Value::Uint8(1));
        assert_eq!(in_and_out(&-7i16), Value::Int16(-7));
        assert_eq!(in_and_out(&2.5f32), Value::Float32(2.5));
    }

    #[test]
    fn test_decode_untagged_returns_input() {
        assert_eq!(decode::<Value>("plain").unwrap(), Value::String("plain".into()));
        assert_eq!(decode::<String>("plain").unwrap(), "plain");
        assert_eq!(decode::<i64>("42").unwrap(), 42);
        assert!(matches!(decode::<Vec<i32>>("plain"), Err(CacheError::DecodeError(_))));
    }

    #[test]
    fn test_decode_unknown_tag_returns_payload() {
        assert_eq!(
            decode::<Value>("complex128##(1+2i)").unwrap(),
            Value::String("(1+2i)".into())
        );
    }

    #[test]
    fn test_payload_containing_separator() {
        assert_eq!(in_and_out("a##b"), Value::String("a##b".into()));
    }

    #[test]
    fn test_decode_sequences_widen() {
        assert_eq!(in_and_out(&["a", "b"].map(String::from)), Value::Structured(json!(["a", "b"])));
        assert_eq!(in_and_out(&vec!["a", "b"]), Value::Structured(json!(["a", "b"])));
        assert_eq!(
            in_and_out(&[[3isize, 4]]),
            Value::Structured(json!([[3.0, 4.0]]))
        );
        assert_eq!(in_and_out(&[1u8, 2]), Value::Structured(json!([1.0, 2.0])));
        assert_eq!(in_and_out(&vec![1.3f64]), Value::Structured(json!([1.3])));
    }

    #[test]
    fn test_decode_records_widen() {
        assert_eq!(
            in_and_out(&MyStruct { abc: 1 }),
            Value::Structured(json!({"Abc": 1.0}))
        );
        assert_eq!(
            in_and_out(&(1i32, "a")),
            Value::Structured(json!([1.0, "a"]))
        );
    }

    #[test]
    fn test_decode_maps() {
        let m = json!({"a": "b", "c": 1.0, "d": 2.1});
        assert_eq!(in_and_out(&m), Value::Structured(m.clone()));
    }

    #[test]
    fn test_decode_into_destination_keeps_width() {
        let bytes: [u8; 2] = decode(&encode(&[1u8, 2]).unwrap()).unwrap();
        assert_eq!(bytes, [1, 2]);

        let nested = vec![vec!["a".to_string(), "b".to_string()]];
        let out: Vec<Vec<String>> = decode(&encode(&nested).unwrap()).unwrap();
        assert_eq!(out, nested);

        let record = Nested {
            inner: MyStruct { abc: 1 },
        };
        let out: Nested = decode(&encode(&record).unwrap()).unwrap();
        assert_eq!(out, record);

        let m: HashMap<i32, f64> = [(123, 4.56)].into();
        let out: HashMap<i32, f64> = decode(&encode(&m).unwrap()).unwrap();
        assert_eq!(out, m);

        let n: u64 = decode(&encode(&u64::MAX).unwrap()).unwrap();
        assert_eq!(n, u64::MAX);
    }

    #[test]
    fn test_decode_records_across_types() {
        // A map entry can fill a record with the same shape.
        let m = json!({"Abc": 3});
        let out: MyStruct = decode(&encode(&m).unwrap()).unwrap();
        assert_eq!(out, MyStruct { abc: 3 });
    }

    #[test]
    fn test_decode_shape_mismatch() {
        let err = decode::<i32>("string##abc").unwrap_err();
        assert!(matches!(err, CacheError::TypeMismatch { expected: "number", .. }));

        let err = decode::<Vec<i32>>("int##1").unwrap_err();
        assert!(matches!(err, CacheError::TypeMismatch { expected: "structured", .. }));

        let err = decode::<bool>("int##1").unwrap_err();
        assert!(matches!(err, CacheError::TypeMismatch { .. }));
    }

    #[test]
    fn test_decode_bad_payload() {
        assert!(matches!(decode::<Value>("int##abc"), Err(CacheError::DecodeError(_))));
        assert!(matches!(decode::<Value>("bool##yes"), Err(CacheError::DecodeError(_))));
        assert!(matches!(decode::<Value>("[]int##[1,"), Err(CacheError::DecodeError(_))));
        assert!(matches!(decode::<u8>("int##300"), Err(CacheError::DecodeError(_))));
    }

    #[test]
    fn test_value_re_encodes_with_its_tag() {
        let v: Value = decode("uint16##9").unwrap();
        assert_eq!(encode(&v).unwrap(), "uint16##9");

        let v: Value = decode(r#"[]int##[1,2]"#).unwrap();
        assert_eq!(encode(&v).unwrap(), "[]interface {}##[1.0,2.0]");
    }

    #[test]
    fn test_records_with_scalar_json_round_trip() {
        let out: UserId = decode(&encode(&UserId(7)).unwrap()).unwrap();
        assert_eq!(out, UserId(7));

        let out: Status = decode(&encode(&Status::Suspended).unwrap()).unwrap();
        assert_eq!(out, Status::Suspended);

        let out: Marker = decode(&encode(&Marker).unwrap()).unwrap();
        assert_eq!(out, Marker);
    }

    #[test]
    fn test_record_rejects_other_scalar_tags() {
        let err = decode::<UserId>("uint64##7").unwrap_err();
        assert!(matches!(err, CacheError::TypeMismatch { .. }));

        let err = decode::<UserId>(&encode(&Status::Active).unwrap()).unwrap_err();
        assert!(matches!(err, CacheError::TypeMismatch { .. }));
    }

    #[test]
    fn test_non_finite_floats_fail_to_encode() {
        assert!(matches!(encode(&vec![1.0f64, f64::NAN]), Err(CacheError::EncodeError(_))));
        assert!(matches!(encode(&(1i32, f32::NEG_INFINITY)), Err(CacheError::EncodeError(_))));
        // Top-level scalars round-trip through their text form.
        let v: f64 = decode(&encode(&f64::INFINITY).unwrap()).unwrap();
        assert_eq!(v, f64::INFINITY);
    }
}
