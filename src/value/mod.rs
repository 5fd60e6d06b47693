//! The generic value model
//!
//! [`Value`] is the family-agnostic slot: a closed enumeration of every leaf
//! and container of both type families plus the scalars they share. The
//! encoder resolves each variant through [`policy::wire_type`](crate::policy::wire_type)
//! and the generic decoder picks the variant from the decode context's family.

use bson::Bson;
use chrono::{DateTime, Utc};

use crate::current;
use crate::error::EncodeError;
use crate::legacy::{self, D, M};
use crate::policy::Family;

/// A BSON value of either family.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    /// Native integer; written as Int32 when it fits, Int64 otherwise.
    Int(i64),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),

    // Legacy family
    ObjectId(legacy::ObjectId),
    RegEx(legacy::RegEx),
    /// Native time, millisecond precision on the wire.
    Time(DateTime<Utc>),
    Binary(legacy::Binary),
    M(M),
    D(D),
    Slice(Vec<Value>),

    // Current family
    Oid(bson::oid::ObjectId),
    Regex(bson::Regex),
    DateTime(bson::DateTime),
    BsonBinary(bson::Binary),
    Map(current::Map),
    Document(current::Document),
    Array(current::Array),

    // Elements neither family has its own type for; both entry points
    // decode them to the same variant.
    Undefined,
    JavaScript(String),
    Symbol(String),
    JavaScriptWithScope(bson::JavaScriptCodeWithScope),
    Timestamp(bson::Timestamp),
    Decimal128(bson::Decimal128),
    MinKey,
    MaxKey,
}

/// Fieldless discriminant of [`Value`], used as a key in the policy tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Int32,
    Int64,
    Double,
    String,
    ObjectId,
    RegEx,
    Time,
    Binary,
    M,
    D,
    Slice,
    Oid,
    Regex,
    DateTime,
    BsonBinary,
    Map,
    Document,
    Array,
    Undefined,
    JavaScript,
    Symbol,
    JavaScriptWithScope,
    Timestamp,
    Decimal128,
    MinKey,
    MaxKey,
}

impl ValueKind {
    pub const ALL: [ValueKind; 29] = [
        ValueKind::Null,
        ValueKind::Bool,
        ValueKind::Int,
        ValueKind::Int32,
        ValueKind::Int64,
        ValueKind::Double,
        ValueKind::String,
        ValueKind::ObjectId,
        ValueKind::RegEx,
        ValueKind::Time,
        ValueKind::Binary,
        ValueKind::M,
        ValueKind::D,
        ValueKind::Slice,
        ValueKind::Oid,
        ValueKind::Regex,
        ValueKind::DateTime,
        ValueKind::BsonBinary,
        ValueKind::Map,
        ValueKind::Document,
        ValueKind::Array,
        ValueKind::Undefined,
        ValueKind::JavaScript,
        ValueKind::Symbol,
        ValueKind::JavaScriptWithScope,
        ValueKind::Timestamp,
        ValueKind::Decimal128,
        ValueKind::MinKey,
        ValueKind::MaxKey,
    ];

    /// The family a kind belongs to; `None` for shared scalars.
    pub fn family(self) -> Option<Family> {
        use ValueKind::*;
        match self {
            Null | Bool | Int32 | Int64 | Double | String => None,
            Undefined | JavaScript | Symbol | JavaScriptWithScope | Timestamp | Decimal128
            | MinKey | MaxKey => None,
            Int | ObjectId | RegEx | Time | Binary | M | D | Slice => Some(Family::Legacy),
            Oid | Regex | DateTime | BsonBinary | Map | Document | Array => Some(Family::Current),
        }
    }

    pub fn is_document(self) -> bool {
        matches!(
            self,
            ValueKind::M | ValueKind::D | ValueKind::Map | ValueKind::Document
        )
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Int32(_) => ValueKind::Int32,
            Value::Int64(_) => ValueKind::Int64,
            Value::Double(_) => ValueKind::Double,
            Value::String(_) => ValueKind::String,
            Value::ObjectId(_) => ValueKind::ObjectId,
            Value::RegEx(_) => ValueKind::RegEx,
            Value::Time(_) => ValueKind::Time,
            Value::Binary(_) => ValueKind::Binary,
            Value::M(_) => ValueKind::M,
            Value::D(_) => ValueKind::D,
            Value::Slice(_) => ValueKind::Slice,
            Value::Oid(_) => ValueKind::Oid,
            Value::Regex(_) => ValueKind::Regex,
            Value::DateTime(_) => ValueKind::DateTime,
            Value::BsonBinary(_) => ValueKind::BsonBinary,
            Value::Map(_) => ValueKind::Map,
            Value::Document(_) => ValueKind::Document,
            Value::Array(_) => ValueKind::Array,
            Value::Undefined => ValueKind::Undefined,
            Value::JavaScript(_) => ValueKind::JavaScript,
            Value::Symbol(_) => ValueKind::Symbol,
            Value::JavaScriptWithScope(_) => ValueKind::JavaScriptWithScope,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::Decimal128(_) => ValueKind::Decimal128,
            Value::MinKey => ValueKind::MinKey,
            Value::MaxKey => ValueKind::MaxKey,
        }
    }

    pub fn family(&self) -> Option<Family> {
        self.kind().family()
    }

    /// Whether an `omitempty` field holding this value is skipped.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(n) | Value::Int64(n) => *n == 0,
            Value::Int32(n) => *n == 0,
            Value::Double(f) => *f == 0.0,
            Value::String(s) => s.is_empty(),
            Value::ObjectId(id) => id.is_empty(),
            Value::RegEx(r) => r.pattern.is_empty() && r.options.is_empty(),
            Value::Time(t) => *t == DateTime::<Utc>::default(),
            Value::Binary(b) => b.data.is_empty(),
            Value::M(m) => m.is_empty(),
            Value::D(d) => d.is_empty(),
            Value::Slice(items) => items.is_empty(),
            Value::Oid(oid) => oid.bytes() == [0u8; 12],
            Value::Regex(r) => r.pattern.is_empty() && r.options.is_empty(),
            Value::DateTime(dt) => dt.timestamp_millis() == 0,
            Value::BsonBinary(b) => b.bytes.is_empty(),
            Value::Map(m) => m.is_empty(),
            Value::Document(d) => d.is_empty(),
            Value::Array(a) => a.is_empty(),
            Value::Undefined => true,
            Value::JavaScript(code) | Value::Symbol(code) => code.is_empty(),
            Value::JavaScriptWithScope(c) => c.code.is_empty() && c.scope.is_empty(),
            Value::Timestamp(ts) => ts.time == 0 && ts.increment == 0,
            Value::Decimal128(_) | Value::MinKey | Value::MaxKey => false,
        }
    }

    /// Look up `key` in a document-kind value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::M(m) => m.get(key),
            Value::D(d) => d.get(key),
            Value::Map(m) => m.get(key),
            Value::Document(d) => d.get(key),
            _ => None,
        }
    }

    /// Elements of a sequence-kind value.
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::Slice(items) => Some(items.as_slice()),
            Value::Array(a) => Some(a.as_slice()),
            _ => None,
        }
    }

    /// Convert into the reference crate's representation.
    ///
    /// Legacy values map onto their current-family equivalents; unordered
    /// maps keep their ascending key order.
    pub fn to_bson(&self) -> Result<Bson, EncodeError> {
        Ok(match self {
            Value::Null => Bson::Null,
            Value::Bool(b) => Bson::Boolean(*b),
            Value::Int(n) => match i32::try_from(*n) {
                Ok(small) => Bson::Int32(small),
                Err(_) => Bson::Int64(*n),
            },
            Value::Int32(n) => Bson::Int32(*n),
            Value::Int64(n) => Bson::Int64(*n),
            Value::Double(f) => Bson::Double(*f),
            Value::String(s) => Bson::String(s.clone()),
            Value::ObjectId(id) => Bson::ObjectId(bson::oid::ObjectId::try_from(*id)?),
            Value::RegEx(r) => Bson::RegularExpression(bson::Regex {
                pattern: r.pattern.clone(),
                options: current::sort_regex_options(&r.options),
            }),
            Value::Time(t) => Bson::DateTime(bson::DateTime::from_millis(t.timestamp_millis())),
            Value::Binary(b) => Bson::Binary(bson::Binary {
                subtype: bson::spec::BinarySubtype::from(b.kind),
                bytes: b.data.clone(),
            }),
            Value::M(m) => Bson::Document(entries_to_document(m.iter())?),
            Value::D(d) => Bson::Document(entries_to_document(
                d.iter().map(|e| (&e.name, &e.value)),
            )?),
            Value::Slice(items) => Bson::Array(
                items
                    .iter()
                    .map(Value::to_bson)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Value::Oid(oid) => Bson::ObjectId(*oid),
            Value::Regex(r) => Bson::RegularExpression(bson::Regex {
                pattern: r.pattern.clone(),
                options: current::sort_regex_options(&r.options),
            }),
            Value::DateTime(dt) => Bson::DateTime(*dt),
            Value::BsonBinary(b) => Bson::Binary(b.clone()),
            Value::Map(m) => Bson::Document(entries_to_document(m.iter())?),
            Value::Document(d) => Bson::Document(entries_to_document(
                d.iter().map(|e| (&e.key, &e.value)),
            )?),
            Value::Array(a) => Bson::Array(
                a.iter()
                    .map(Value::to_bson)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Value::Undefined => Bson::Undefined,
            Value::JavaScript(code) => Bson::JavaScriptCode(code.clone()),
            Value::Symbol(s) => Bson::Symbol(s.clone()),
            Value::JavaScriptWithScope(c) => Bson::JavaScriptCodeWithScope(c.clone()),
            Value::Timestamp(ts) => Bson::Timestamp(*ts),
            Value::Decimal128(d) => Bson::Decimal128(*d),
            Value::MinKey => Bson::MinKey,
            Value::MaxKey => Bson::MaxKey,
        })
    }
}

fn entries_to_document<'a>(
    entries: impl Iterator<Item = (&'a String, &'a Value)>,
) -> Result<bson::Document, EncodeError> {
    let mut doc = bson::Document::new();
    for (key, value) in entries {
        if doc.contains_key(key) {
            return Err(EncodeError::Unsupported(format!(
                "duplicate key '{key}' has no bson::Document equivalent"
            )));
        }
        doc.insert(key.clone(), value.to_bson()?);
    }
    Ok(doc)
}

/* ========================= Conversions into Value ========================= */

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int32(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Double(f)
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

impl From<legacy::ObjectId> for Value {
    fn from(id: legacy::ObjectId) -> Self {
        Value::ObjectId(id)
    }
}

impl From<legacy::RegEx> for Value {
    fn from(r: legacy::RegEx) -> Self {
        Value::RegEx(r)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Time(t)
    }
}

impl From<legacy::Binary> for Value {
    fn from(b: legacy::Binary) -> Self {
        Value::Binary(b)
    }
}

impl From<M> for Value {
    fn from(m: M) -> Self {
        Value::M(m)
    }
}

impl From<D> for Value {
    fn from(d: D) -> Self {
        Value::D(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Slice(items)
    }
}

impl From<bson::oid::ObjectId> for Value {
    fn from(oid: bson::oid::ObjectId) -> Self {
        Value::Oid(oid)
    }
}

impl From<bson::Regex> for Value {
    fn from(r: bson::Regex) -> Self {
        Value::Regex(r)
    }
}

impl From<bson::DateTime> for Value {
    fn from(dt: bson::DateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl From<bson::Binary> for Value {
    fn from(b: bson::Binary) -> Self {
        Value::BsonBinary(b)
    }
}

impl From<current::Map> for Value {
    fn from(m: current::Map) -> Self {
        Value::Map(m)
    }
}

impl From<current::Document> for Value {
    fn from(d: current::Document) -> Self {
        Value::Document(d)
    }
}

impl From<bson::Timestamp> for Value {
    fn from(ts: bson::Timestamp) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<bson::Decimal128> for Value {
    fn from(d: bson::Decimal128) -> Self {
        Value::Decimal128(d)
    }
}

impl From<current::Array> for Value {
    fn from(a: current::Array) -> Self {
        Value::Array(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_families() {
        assert_eq!(Value::Int(1).family(), Some(Family::Legacy));
        assert_eq!(Value::Int32(1).family(), None);
        assert_eq!(
            Value::Oid(bson::oid::ObjectId::new()).family(),
            Some(Family::Current)
        );
        assert!(ValueKind::M.is_document());
        assert!(!ValueKind::Slice.is_document());
    }

    #[test]
    fn test_is_empty() {
        assert!(Value::ObjectId(legacy::ObjectId::default()).is_empty());
        assert!(Value::Oid(bson::oid::ObjectId::from_bytes([0; 12])).is_empty());
        assert!(!Value::Oid(bson::oid::ObjectId::new()).is_empty());
        assert!(Value::String(String::new()).is_empty());
        assert!(!Value::Bool(true).is_empty());
        assert!(Value::M(M::new()).is_empty());
    }

    #[test]
    fn test_to_bson_widens_native_int() {
        assert_eq!(Value::Int(123).to_bson().unwrap(), Bson::Int32(123));
        assert_eq!(
            Value::Int(i64::from(i32::MAX) + 1).to_bson().unwrap(),
            Bson::Int64(i64::from(i32::MAX) + 1)
        );
    }

    #[test]
    fn test_to_bson_rejects_duplicate_keys() {
        let mut d = D::new();
        d.push("a", 1);
        d.push("a", 2);
        assert!(matches!(
            Value::D(d).to_bson(),
            Err(EncodeError::Unsupported(_))
        ));
    }

    #[test]
    fn test_to_bson_rejects_empty_legacy_id() {
        let err = Value::ObjectId(legacy::ObjectId::default())
            .to_bson()
            .unwrap_err();
        assert_eq!(err, EncodeError::InvalidObjectId { len: 0 });
    }

    #[test]
    fn test_to_bson_carries_reference_only_types() {
        let ts = bson::Timestamp { time: 7, increment: 3 };
        assert_eq!(Value::Timestamp(ts).to_bson().unwrap(), Bson::Timestamp(ts));
        assert_eq!(Value::MaxKey.to_bson().unwrap(), Bson::MaxKey);
        assert_eq!(
            Value::JavaScript("f()".to_string()).to_bson().unwrap(),
            Bson::JavaScriptCode("f()".to_string())
        );
        assert_eq!(Value::MinKey.family(), None);
        assert!(Value::Undefined.is_empty());
    }

    #[test]
    fn test_get_and_as_slice() {
        let mut m = M::new();
        m.insert("list".to_string(), Value::Slice(vec![Value::Int(1)]));
        let value = Value::M(m);
        let list = value.get("list").and_then(Value::as_slice).unwrap();
        assert_eq!(list, &[Value::Int(1)]);
        assert!(value.get("missing").is_none());
    }
}
