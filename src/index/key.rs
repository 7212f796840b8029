use crate::document::{Number, TypeClass, get_path};
use crate::types::DocumentId;
use bson::{Bson, Document as BsonDocument};
use std::fmt;

/// One part of an index key. Numbers keep their exact value, so key order and
/// equality agree with predicate comparison. Variant order follows the
/// cross-type order of [`TypeClass`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyValue {
    Missing,
    Num(Number),
    Str(String),
    Bool(bool),
    Date(i64),
}

impl KeyValue {
    /// Key for a stored value; null, absent and non-scalar values index as `Missing`.
    #[must_use]
    pub fn from_bson(v: Option<&Bson>) -> Self {
        v.and_then(Self::scalar).unwrap_or(Self::Missing)
    }

    /// Key for a scalar literal, `None` for anything else.
    #[must_use]
    pub fn scalar(v: &Bson) -> Option<Self> {
        match v {
            Bson::String(s) => Some(Self::Str(s.clone())),
            Bson::Boolean(b) => Some(Self::Bool(*b)),
            Bson::DateTime(d) => Some(Self::Date(d.timestamp_millis())),
            other if TypeClass::of(other) == TypeClass::Number => Number::of(other).map(Self::Num),
            _ => None,
        }
    }

    #[must_use]
    pub const fn class(&self) -> TypeClass {
        match self {
            Self::Missing => TypeClass::Null,
            Self::Num(_) => TypeClass::Number,
            Self::Str(_) => TypeClass::String,
            Self::Bool(_) => TypeClass::Bool,
            Self::Date(_) => TypeClass::Date,
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("null"),
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Date(ms) => write!(f, "Date({ms})"),
        }
    }
}

/// Full key of one document in one index: a part per indexed field.
pub type IndexKey = Vec<KeyValue>;

#[must_use]
pub fn key_for(doc: &BsonDocument, paths: &[String]) -> IndexKey {
    paths.iter().map(|p| KeyValue::from_bson(get_path(doc, p))).collect()
}

#[must_use]
pub fn display_key(key: &[KeyValue]) -> String {
    let parts: Vec<String> = key.iter().map(ToString::to_string).collect();
    format!("({})", parts.join(", "))
}

/// Reference from an index entry to a stored document. Orders by slot, which
/// is insertion order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocRef {
    pub slot: u64,
    pub id: DocumentId,
}
