//! Current type family
//!
//! Leaf types are the reference `bson` crate's own ([`ObjectId`], [`Regex`],
//! [`DateTime`], [`Binary`]). The generic containers [`Map`], [`Document`]
//! and [`Array`] hold arbitrary [`Value`]s, the way the reference
//! implementation's generic containers do, and convert losslessly to and
//! from `bson::Document` / `bson::Bson` when every leaf is representable.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use bson::Bson;

use crate::codec::{Codec, Unmarshal};
use crate::encode::Marshal;
use crate::error::{DecodeError, EncodeError};
use crate::policy::Family;
use crate::value::Value;

pub use bson::oid::ObjectId;
pub use bson::{Binary, DateTime, Regex};

/// Unordered document of the current family, iterated in ascending key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Map(BTreeMap<String, Value>);

impl Map {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Deref for Map {
    type Target = BTreeMap<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Map {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Map {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A single entry of a current-family ordered document.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: String,
    pub value: Value,
}

/// Ordered document of the current family; keys may repeat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document(Vec<Entry>);

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.push(Entry {
            key: key.into(),
            value: value.into(),
        });
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|e| e.key == key).map(|e| &e.value)
    }
}

impl Deref for Document {
    type Target = Vec<Entry>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Document {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| Entry {
                    key: k.into(),
                    value: v.into(),
                })
                .collect(),
        )
    }
}

/// Generic array of the current family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Array(Vec<Value>);

impl Array {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Deref for Array {
    type Target = Vec<Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Array {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Vec<Value>> for Array {
    fn from(items: Vec<Value>) -> Self {
        Self(items)
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Sort regex option characters into BSON canonical (ascending) order.
pub fn sort_regex_options(options: &str) -> String {
    let mut chars: Vec<char> = options.chars().collect();
    chars.sort_unstable();
    chars.into_iter().collect()
}

/* ========================= Reference crate conversions ========================= */

impl TryFrom<Bson> for Value {
    type Error = DecodeError;

    /// Convert a reference value into current-family values.
    fn try_from(value: Bson) -> Result<Self, Self::Error> {
        Ok(match value {
            Bson::Null => Value::Null,
            Bson::Boolean(b) => Value::Bool(b),
            Bson::Int32(n) => Value::Int32(n),
            Bson::Int64(n) => Value::Int64(n),
            Bson::Double(f) => Value::Double(f),
            Bson::String(s) => Value::String(s),
            Bson::ObjectId(oid) => Value::Oid(oid),
            Bson::RegularExpression(r) => Value::Regex(r),
            Bson::DateTime(dt) => Value::DateTime(dt),
            Bson::Binary(b) => Value::BsonBinary(b),
            Bson::Document(doc) => Value::Document(Document::try_from(doc)?),
            Bson::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<Array, _>>()?,
            ),
            Bson::Undefined => Value::Undefined,
            Bson::JavaScriptCode(code) => Value::JavaScript(code),
            Bson::Symbol(s) => Value::Symbol(s),
            Bson::JavaScriptCodeWithScope(code) => Value::JavaScriptWithScope(code),
            Bson::Timestamp(ts) => Value::Timestamp(ts),
            Bson::Decimal128(d) => Value::Decimal128(d),
            Bson::MinKey => Value::MinKey,
            Bson::MaxKey => Value::MaxKey,
            other => {
                return Err(DecodeError::UnsupportedElement {
                    key: String::new(),
                    tag: other.element_type() as u8,
                });
            }
        })
    }
}

impl TryFrom<bson::Document> for Document {
    type Error = DecodeError;

    fn try_from(doc: bson::Document) -> Result<Self, Self::Error> {
        doc.into_iter()
            .map(|(k, v)| Ok((k, Value::try_from(v)?)))
            .collect()
    }
}

impl TryFrom<&Document> for bson::Document {
    type Error = EncodeError;

    fn try_from(doc: &Document) -> Result<Self, Self::Error> {
        match Value::Document(doc.clone()).to_bson()? {
            Bson::Document(d) => Ok(d),
            other => Err(EncodeError::Unsupported(format!(
                "{:?} is not a document",
                other.element_type()
            ))),
        }
    }
}

/// Encode `value` as a BSON document.
pub fn marshal<T: Marshal + ?Sized>(value: &T) -> Result<Vec<u8>, EncodeError> {
    crate::encode::marshal(value)
}

/// Decode `data` into `out` through the current entry point.
///
/// `out` is left untouched when decoding fails.
pub fn unmarshal<T: Unmarshal>(data: &[u8], out: &mut T) -> Result<(), DecodeError> {
    Codec::default().unmarshal(Family::Current, data, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_sort_regex_options() {
        assert_eq!(sort_regex_options("xmi"), "imx");
        assert_eq!(sort_regex_options(""), "");
    }

    #[test]
    fn test_document_from_bson_keeps_order() {
        let doc = doc! { "z": 1, "a": { "b": [1_i64, "x"] } };
        let converted = Document::try_from(doc.clone()).unwrap();
        let keys: Vec<_> = converted.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["z", "a"]);

        let back = bson::Document::try_from(&converted).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_reference_only_bson_converts() {
        assert_eq!(Value::try_from(Bson::MinKey).unwrap(), Value::MinKey);
        let ts = bson::Timestamp { time: 1, increment: 1 };
        assert_eq!(Value::try_from(Bson::Timestamp(ts)).unwrap(), Value::Timestamp(ts));
    }

    #[test]
    fn test_db_pointer_is_rejected() {
        let pointer = Bson::try_from(serde_json::json!({
            "$dbPointer": { "$ref": "db.coll", "$id": { "$oid": "507f1f77bcf86cd799439011" } }
        }))
        .unwrap();
        let err = Value::try_from(pointer).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedElement { tag: 0x0c, .. }));
    }
}
