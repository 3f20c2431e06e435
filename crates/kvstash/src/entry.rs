//! Encoded entries: `"<type-tag>##<payload>"`.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};

/// Separator between the type tag and the payload.
pub const SEPARATOR: &str = "##";

/// Primitive type names understood by the scalar decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Bool,
    String,
}

impl Primitive {
    /// Canonical tag name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint => "uint",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Bool => "bool",
            Self::String => "string",
        }
    }

    /// Look up a primitive by tag name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "int" => Self::Int,
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint" => Self::Uint,
            "uint8" => Self::Uint8,
            "uint16" => Self::Uint16,
            "uint32" => Self::Uint32,
            "uint64" => Self::Uint64,
            "float32" => Self::Float32,
            "float64" => Self::Float64,
            "bool" => Self::Bool,
            "string" => Self::String,
            _ => return None,
        })
    }

    /// Whether this is an integer or float type.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Self::Bool | Self::String)
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classification of an entry's tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    /// A known scalar type.
    Primitive(Primitive),
    /// A sequence, map, tuple or record serialized as JSON.
    Structured(String),
    /// Anything else; the payload is kept as text.
    Other(String),
}

impl TypeTag {
    /// Classify a tag, looking at the payload for record types.
    pub fn classify(tag: &str, payload: &str) -> Self {
        if let Some(p) = Primitive::from_name(tag) {
            return Self::Primitive(p);
        }
        let structured_name = tag.starts_with('[')
            || tag.starts_with('(')
            || tag.starts_with("map[")
            || tag.starts_with("interface {}");
        let structured_payload = payload.starts_with('{') || payload.starts_with('[');
        if structured_name || structured_payload {
            Self::Structured(tag.to_string())
        } else {
            Self::Other(tag.to_string())
        }
    }

    /// The tag as written in the entry.
    pub fn name(&self) -> &str {
        match self {
            Self::Primitive(p) => p.name(),
            Self::Structured(name) | Self::Other(name) => name,
        }
    }
}

/// A parsed `"<type-tag>##<payload>"` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<'a> {
    tag: &'a str,
    payload: &'a str,
}

impl<'a> Entry<'a> {
    /// Split on the first separator. Returns `None` for untagged strings.
    pub fn parse(compressed: &'a str) -> Option<Self> {
        let (tag, payload) = compressed.split_once(SEPARATOR)?;
        if tag.is_empty() {
            return None;
        }
        Some(Self { tag, payload })
    }

    /// Raw tag text.
    pub fn tag(&self) -> &'a str {
        self.tag
    }

    /// Raw payload text.
    pub fn payload(&self) -> &'a str {
        self.payload
    }

    /// Classified tag.
    pub fn type_tag(&self) -> TypeTag {
        TypeTag::classify(self.tag, self.payload)
    }
}

impl fmt::Display for Entry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.tag, SEPARATOR, self.payload)
    }
}

/// Join a tag and payload into an entry string.
pub fn join(tag: &str, payload: &str) -> String {
    let mut s = String::with_capacity(tag.len() + SEPARATOR.len() + payload.len());
    s.push_str(tag);
    s.push_str(SEPARATOR);
    s.push_str(payload);
    s
}

/// Transport-encode an entry for the store.
pub fn to_transport(compressed: &str) -> String {
    STANDARD.encode(compressed.as_bytes())
}

/// Decode a stored value back into an entry string.
///
/// Returns `None` when the stored value is not base64 of a tagged UTF-8
/// entry, e.g. a counter written as a plain integer.
pub fn from_transport(stored: &str) -> Option<String> {
    let bytes = STANDARD.decode(stored).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    Entry::parse(&decoded)?;
    Some(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_names_round_trip() {
        for p in [
            Primitive::Int,
            Primitive::Uint8,
            Primitive::Float32,
            Primitive::Bool,
            Primitive::String,
        ] {
            assert_eq!(Primitive::from_name(p.name()), Some(p));
        }
        assert_eq!(Primitive::from_name("complex128"), None);
        assert!(Primitive::Uint64.is_numeric());
        assert!(!Primitive::Bool.is_numeric());
    }

    #[test]
    fn test_parse_splits_on_first_separator() {
        let entry = Entry::parse("string##a##b").unwrap();
        assert_eq!(entry.tag(), "string");
        assert_eq!(entry.payload(), "a##b");
        assert_eq!(entry.to_string(), "string##a##b");
    }

    #[test]
    fn test_parse_rejects_untagged() {
        assert!(Entry::parse("plain").is_none());
        assert!(Entry::parse("##payload").is_none());
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            TypeTag::classify("int", "1"),
            TypeTag::Primitive(Primitive::Int)
        );
        assert!(matches!(TypeTag::classify("[]string", "[]"), TypeTag::Structured(_)));
        assert!(matches!(TypeTag::classify("[2]uint8", "[1,2]"), TypeTag::Structured(_)));
        assert!(matches!(TypeTag::classify("map[int]string", "{}"), TypeTag::Structured(_)));
        assert!(matches!(
            TypeTag::classify("app::User", r#"{"id":1}"#),
            TypeTag::Structured(_)
        ));
        assert!(matches!(TypeTag::classify("complex128", "(1+2i)"), TypeTag::Other(_)));
        // Primitive tags win over payload sniffing.
        assert_eq!(
            TypeTag::classify("string", "{not json"),
            TypeTag::Primitive(Primitive::String)
        );
    }

    #[test]
    fn test_transport() {
        let stored = to_transport("bool##true");
        assert_eq!(stored, "Ym9vbCMjdHJ1ZQ==");
        assert_eq!(from_transport(&stored).as_deref(), Some("bool##true"));
    }

    #[test]
    fn test_transport_rejects_raw_values() {
        assert_eq!(from_transport("5"), None);
        assert_eq!(from_transport("hello world"), None);
        // Valid base64 that does not decode to a tagged entry.
        assert_eq!(from_transport(&STANDARD.encode("untagged")), None);
    }
}
