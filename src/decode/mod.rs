//! BSON decoder
//!
//! [`DocumentReader`] yields raw [`Element`]s; [`decode_value`] turns one into
//! a generic [`Value`] according to the [`DecodeContext`]:
//!
//! - embedded documents use the locked representation, or the entry
//!   family's default, and lock it for their subtree
//! - arrays, identifiers, regexes, binaries, times and numbers follow the
//!   entry family
//! - elements neither family has a type for (timestamp, decimal128, code,
//!   symbol, undefined, min/max key) decode to the same variant from both
//!   entry points; the deprecated DBPointer is rejected
//!
//! Structural destinations are handled by [`Field`](crate::field::Field).

mod context;
mod reader;

use bson::spec::BinarySubtype;
use chrono::{DateTime, Utc};

use crate::codec::Unmarshal;
use crate::current;
use crate::error::DecodeError;
use crate::legacy::{self, D, M};
use crate::policy::{self, Coercion, ElementType, Family, Slot};
use crate::value::Value;

pub use context::{DEFAULT_MAX_DEPTH, DecodeContext, DecodeOptions, DocumentKind};
pub use reader::{DocumentReader, Element};

/// Decode one element into a generic value.
pub fn decode_value(element: &Element<'_>, ctx: &DecodeContext) -> Result<Value, DecodeError> {
    if element.kind == ElementType::DbPointer {
        return Err(unsupported(element));
    }
    let action = policy::check(element.key, element.kind, Slot::Any, ctx.generic())?;
    let legacy = ctx.family() == Family::Legacy;

    Ok(match (element.kind, action) {
        (ElementType::Null, _) => Value::Null,
        (ElementType::Boolean, _) => Value::Bool(element.as_bool()?),
        (ElementType::Double, _) => Value::Double(element.as_f64()?),
        (ElementType::Int32, Coercion::Convert) => Value::Int(i64::from(element.as_i32()?)),
        (ElementType::Int32, _) => Value::Int32(element.as_i32()?),
        (ElementType::Int64, _) => Value::Int64(element.as_i64()?),
        (ElementType::String, _) => Value::String(
            element
                .as_str(ctx.options().lossy_utf8)?
                .into_owned(),
        ),
        (ElementType::ObjectId, _) => {
            let bytes = element.as_object_id()?;
            if legacy {
                Value::ObjectId(legacy::ObjectId::from_bytes(bytes))
            } else {
                Value::Oid(bson::oid::ObjectId::from_bytes(bytes))
            }
        }
        (ElementType::Regex, _) => {
            let (pattern, options) = element.as_regex()?;
            if legacy {
                Value::RegEx(legacy::RegEx::new(pattern, options))
            } else {
                Value::Regex(bson::Regex {
                    pattern: pattern.to_string(),
                    options: options.to_string(),
                })
            }
        }
        (ElementType::DateTime, Coercion::Convert) => {
            let millis = element.as_datetime_millis()?;
            match DateTime::from_timestamp_millis(millis) {
                Some(time) => Value::Time(time),
                // Outside native time's range; keep the raw milliseconds.
                None => Value::DateTime(bson::DateTime::from_millis(millis)),
            }
        }
        (ElementType::DateTime, _) => {
            Value::DateTime(bson::DateTime::from_millis(element.as_datetime_millis()?))
        }
        (ElementType::Binary, _) => {
            let (subtype, data) = element.as_binary()?;
            if legacy {
                Value::Binary(legacy::Binary {
                    kind: subtype,
                    data: data.to_vec(),
                })
            } else {
                Value::BsonBinary(bson::Binary {
                    subtype: BinarySubtype::from(subtype),
                    bytes: data.to_vec(),
                })
            }
        }
        (ElementType::Document, _) => {
            let kind = ctx.document_kind();
            let inner = ctx.descend()?.lock(kind);
            decode_document(kind, element.as_document()?, &inner)?
        }
        (ElementType::Array, _) => {
            let inner = ctx.descend()?;
            let items = decode_items(element.as_array()?, &inner)?;
            if legacy {
                Value::Slice(items)
            } else {
                Value::Array(current::Array::from(items))
            }
        }
        (ElementType::Undefined, _) => Value::Undefined,
        (ElementType::MinKey, _) => Value::MinKey,
        (ElementType::MaxKey, _) => Value::MaxKey,
        (ElementType::Timestamp, _) => Value::Timestamp(element.as_timestamp()?),
        (ElementType::Decimal128, _) => Value::Decimal128(element.as_decimal128()?),
        (ElementType::JavaScript, _) => Value::JavaScript(element.as_str(false)?.into_owned()),
        (ElementType::Symbol, _) => Value::Symbol(element.as_str(false)?.into_owned()),
        (ElementType::JavaScriptWithScope, _) => {
            let (code, scope) = element.as_code_with_scope()?;
            let scope = <bson::Document as Unmarshal>::unmarshal_document(scope, &ctx.descend()?)?;
            Value::JavaScriptWithScope(bson::JavaScriptCodeWithScope {
                code: code.to_string(),
                scope,
            })
        }
        (ElementType::DbPointer, _) => return Err(unsupported(element)),
    })
}

fn unsupported(element: &Element<'_>) -> DecodeError {
    DecodeError::UnsupportedElement {
        key: element.key.to_string(),
        tag: element.kind.tag(),
    }
}

/// Decode a whole document into the representation `kind`.
pub fn decode_document(
    kind: DocumentKind,
    reader: DocumentReader<'_>,
    ctx: &DecodeContext,
) -> Result<Value, DecodeError> {
    Ok(match kind {
        DocumentKind::M => Value::M(decode_m(reader, ctx)?),
        DocumentKind::D => Value::D(decode_d(reader, ctx)?),
        DocumentKind::Map => Value::Map(decode_map(reader, ctx)?),
        DocumentKind::Document => Value::Document(decode_current_document(reader, ctx)?),
    })
}

/// Later duplicates of a key overwrite earlier ones.
pub fn decode_m(reader: DocumentReader<'_>, ctx: &DecodeContext) -> Result<M, DecodeError> {
    let mut m = M::new();
    for element in reader {
        let element = element?;
        m.insert(element.key.to_string(), decode_value(&element, ctx)?);
    }
    Ok(m)
}

/// Every element is kept in wire order, duplicates included.
pub fn decode_d(reader: DocumentReader<'_>, ctx: &DecodeContext) -> Result<D, DecodeError> {
    let mut d = D::new();
    for element in reader {
        let element = element?;
        d.push(element.key, decode_value(&element, ctx)?);
    }
    Ok(d)
}

pub fn decode_map(
    reader: DocumentReader<'_>,
    ctx: &DecodeContext,
) -> Result<current::Map, DecodeError> {
    let mut map = current::Map::new();
    for element in reader {
        let element = element?;
        map.insert(element.key.to_string(), decode_value(&element, ctx)?);
    }
    Ok(map)
}

pub fn decode_current_document(
    reader: DocumentReader<'_>,
    ctx: &DecodeContext,
) -> Result<current::Document, DecodeError> {
    let mut doc = current::Document::new();
    for element in reader {
        let element = element?;
        doc.push(element.key, decode_value(&element, ctx)?);
    }
    Ok(doc)
}

/// Values of an array (or a document read as one), in wire order.
pub fn decode_items(reader: DocumentReader<'_>, ctx: &DecodeContext) -> Result<Vec<Value>, DecodeError> {
    reader
        .map(|element| decode_value(&element?, ctx))
        .collect()
}

/// Native time from milliseconds since the Unix epoch.
///
/// Structural native-time fields fail on values outside chrono's range;
/// generic destinations fall back to `bson::DateTime` instead.
pub fn time_from_millis(millis: i64) -> Result<DateTime<Utc>, DecodeError> {
    DateTime::from_timestamp_millis(millis).ok_or(DecodeError::DateTimeOutOfRange(millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn bytes(doc: &bson::Document) -> Vec<u8> {
        let mut buf = Vec::new();
        doc.to_writer(&mut buf).unwrap();
        buf
    }

    fn decode_root(family: Family, doc: &bson::Document) -> Value {
        let data = bytes(doc);
        let ctx = DecodeContext::new(family, DecodeOptions::default());
        let kind = ctx.document_kind();
        let reader = DocumentReader::new(&data).unwrap();
        decode_document(kind, reader, &ctx.lock(kind)).unwrap()
    }

    #[test]
    fn test_legacy_entry_yields_legacy_leaves() {
        let oid = bson::oid::ObjectId::new();
        let value = decode_root(
            Family::Legacy,
            &doc! {
                "id": oid,
                "n": 1,
                "l": 2_i64,
                "t": bson::DateTime::from_millis(1_500),
                "list": [1, "x"],
            },
        );

        assert_eq!(
            value.get("id"),
            Some(&Value::ObjectId(legacy::ObjectId::from(oid)))
        );
        assert_eq!(value.get("n"), Some(&Value::Int(1)));
        assert_eq!(value.get("l"), Some(&Value::Int64(2)));
        assert_eq!(
            value.get("t"),
            Some(&Value::Time(time_from_millis(1_500).unwrap()))
        );
        assert_eq!(
            value.get("list"),
            Some(&Value::Slice(vec![Value::Int(1), Value::from("x")]))
        );
    }

    #[test]
    fn test_current_entry_yields_current_leaves() {
        let oid = bson::oid::ObjectId::new();
        let value = decode_root(Family::Current, &doc! { "id": oid, "n": 1, "list": [true] });

        assert!(matches!(value, Value::Document(_)));
        assert_eq!(value.get("id"), Some(&Value::Oid(oid)));
        assert_eq!(value.get("n"), Some(&Value::Int32(1)));
        assert_eq!(
            value.get("list"),
            Some(&Value::Array(current::Array::from(vec![Value::Bool(true)])))
        );
    }

    #[test]
    fn test_lock_reaches_documents_inside_arrays() {
        let data = bytes(&doc! { "a": [{ "b": { "c": 1 } }] });
        let ctx = DecodeContext::new(Family::Current, DecodeOptions::default()).lock(DocumentKind::D);
        let value = decode_document(DocumentKind::D, DocumentReader::new(&data).unwrap(), &ctx).unwrap();

        let first = &value.get("a").and_then(Value::as_slice).unwrap()[0];
        assert!(matches!(first, Value::D(_)));
        assert!(matches!(first.get("b"), Some(Value::D(_))));
        assert_eq!(first.get("b").and_then(|b| b.get("c")), Some(&Value::Int32(1)));
    }

    #[test]
    fn test_unlocked_documents_take_entry_default() {
        let data = bytes(&doc! { "a": { "b": 1 } });
        let ctx = DecodeContext::new(Family::Legacy, DecodeOptions::default());
        let items = decode_items(DocumentReader::new(&data).unwrap(), &ctx).unwrap();
        assert!(matches!(items[0], Value::M(_)));
    }

    #[test]
    fn test_depth_limit() {
        let data = bytes(&doc! { "a": { "b": { "c": 1 } } });
        let options = DecodeOptions {
            max_depth: 1,
            ..Default::default()
        };
        let ctx = DecodeContext::new(Family::Legacy, options);
        let err = decode_m(DocumentReader::new(&data).unwrap(), &ctx).unwrap_err();
        assert_eq!(err, DecodeError::DepthExceeded(1));
    }

    #[test]
    fn test_m_last_duplicate_wins_and_d_keeps_all() {
        // {"x": 1, "x": 2}
        let data = [
            19, 0, 0, 0, 0x10, b'x', 0, 1, 0, 0, 0, 0x10, b'x', 0, 2, 0, 0, 0, 0,
        ];
        let ctx = DecodeContext::new(Family::Legacy, DecodeOptions::default());
        let m = decode_m(DocumentReader::new(&data).unwrap(), &ctx).unwrap();
        assert_eq!(m.get("x"), Some(&Value::Int(2)));

        let d = decode_d(DocumentReader::new(&data).unwrap(), &ctx).unwrap();
        assert_eq!(d.len(), 2);
        assert_eq!(d[0].value, Value::Int(1));
    }

    #[test]
    fn test_generic_legacy_time_keeps_millis_outside_native_range() {
        for millis in [i64::MAX, i64::MIN] {
            let value = decode_root(
                Family::Legacy,
                &doc! { "t": bson::DateTime::from_millis(millis) },
            );
            assert_eq!(
                value.get("t"),
                Some(&Value::DateTime(bson::DateTime::from_millis(millis)))
            );
        }
    }

    #[test]
    fn test_reference_only_elements_decode_in_both_families() {
        let ts = bson::Timestamp { time: 5, increment: 9 };
        let dec = bson::Decimal128::from_bytes([1; 16]);
        let source = doc! {
            "ts": ts,
            "dec": bson::Bson::Decimal128(dec),
            "js": bson::Bson::JavaScriptCode("f()".to_string()),
            "cws": bson::Bson::JavaScriptCodeWithScope(bson::JavaScriptCodeWithScope {
                code: "g()".to_string(),
                scope: doc! { "y": "z" },
            }),
            "max": bson::Bson::MaxKey,
        };
        for family in [Family::Legacy, Family::Current] {
            let value = decode_root(family, &source);
            assert_eq!(value.get("ts"), Some(&Value::Timestamp(ts)));
            assert_eq!(value.get("dec"), Some(&Value::Decimal128(dec)));
            assert_eq!(value.get("js"), Some(&Value::JavaScript("f()".to_string())));
            assert_eq!(
                value.get("cws"),
                Some(&Value::JavaScriptWithScope(bson::JavaScriptCodeWithScope {
                    code: "g()".to_string(),
                    scope: doc! { "y": "z" },
                }))
            );
            assert_eq!(value.get("max"), Some(&Value::MaxKey));
        }
    }

    #[test]
    fn test_datetime_out_of_range() {
        assert_eq!(
            time_from_millis(i64::MAX).unwrap_err(),
            DecodeError::DateTimeOutOfRange(i64::MAX)
        );
    }
}
