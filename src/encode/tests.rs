use super::*;
use crate::legacy::{self, ObjectId};
use bson::{doc, spec::BinarySubtype};
use chrono::{TimeZone, Utc};

const HEX: &str = "507f1f77bcf86cd799439011";

fn reference(doc: &bson::Document) -> Vec<u8> {
    let mut buf = Vec::new();
    doc.to_writer(&mut buf).unwrap();
    buf
}

#[test]
fn test_empty_document() {
    assert_eq!(marshal(&M::new()).unwrap(), vec![5, 0, 0, 0, 0]);
    assert_eq!(marshal(&current::Document::new()).unwrap(), vec![5, 0, 0, 0, 0]);
}

#[test]
fn test_scalars_match_reference() {
    let mut d = D::new();
    d.push("s", "hello");
    d.push("b", true);
    d.push("i", 42);
    d.push("l", 1_i64 << 40);
    d.push("f", 1.5);
    d.push("n", Value::Null);

    let expected = doc! {
        "s": "hello",
        "b": true,
        "i": 42,
        "l": 1_i64 << 40,
        "f": 1.5,
        "n": null,
    };
    assert_eq!(marshal(&d).unwrap(), reference(&expected));
}

#[test]
fn test_native_int_widens_only_when_needed() {
    let mut d = D::new();
    d.push("small", Value::Int(7));
    d.push("big", Value::Int(i64::from(i32::MAX) + 1));
    let expected = doc! { "small": 7_i32, "big": i64::from(i32::MAX) + 1 };
    assert_eq!(marshal(&d).unwrap(), reference(&expected));
}

#[test]
fn test_identifiers_of_both_families_encode_identically() {
    let legacy_id = ObjectId::from_hex(HEX).unwrap();
    let current_id = bson::oid::ObjectId::parse_str(HEX).unwrap();

    let a = marshal(&[("_id", legacy_id)].into_iter().collect::<M>()).unwrap();
    let b = marshal(&[("_id", current_id)].into_iter().collect::<current::Map>()).unwrap();
    assert_eq!(a, b);
    assert_eq!(a, reference(&doc! { "_id": current_id }));
}

#[test]
fn test_empty_legacy_identifier_fails() {
    let m: M = [("_id", ObjectId::default())].into_iter().collect();
    assert_eq!(
        marshal(&m).unwrap_err(),
        EncodeError::InvalidObjectId { len: 0 }
    );
}

#[test]
fn test_time_is_written_in_milliseconds() {
    let t = Utc.timestamp_millis_opt(1_234_567_890_123).unwrap();
    let m: M = [("t", t)].into_iter().collect();
    let expected = doc! { "t": bson::DateTime::from_millis(1_234_567_890_123) };
    assert_eq!(marshal(&m).unwrap(), reference(&expected));
}

#[test]
fn test_regex_options_are_sorted() {
    let m: M = [("re", legacy::RegEx::new("^a", "xmi"))].into_iter().collect();
    let expected = doc! {
        "re": bson::Regex { pattern: "^a".to_string(), options: "imx".to_string() }
    };
    assert_eq!(marshal(&m).unwrap(), reference(&expected));
}

#[test]
fn test_regex_with_nul_fails() {
    let m: M = [("re", legacy::RegEx::new("a\0b", ""))].into_iter().collect();
    assert!(matches!(marshal(&m), Err(EncodeError::InteriorNul(_))));
}

#[test]
fn test_key_with_nul_fails() {
    let m: M = [("a\0b", 1)].into_iter().collect();
    assert!(matches!(marshal(&m), Err(EncodeError::InteriorNul(_))));
}

#[test]
fn test_generic_binary_matches_reference() {
    let bin = legacy::Binary {
        kind: 0x80,
        data: vec![1, 2, 3],
    };
    let m: M = [("bin", bin)].into_iter().collect();
    let expected = doc! {
        "bin": bson::Binary { subtype: BinarySubtype::UserDefined(0x80), bytes: vec![1, 2, 3] }
    };
    assert_eq!(marshal(&m).unwrap(), reference(&expected));
}

#[test]
fn test_old_binary_subtype_nests_length() {
    let bin = legacy::Binary {
        kind: 0x02,
        data: vec![0xaa, 0xbb],
    };
    let m: M = [("b", bin)].into_iter().collect();
    let bytes = marshal(&m).unwrap();

    // 4 len + tag + "b\0" + 4 outer len + subtype + 4 inner len + 2 data + terminator
    assert_eq!(bytes.len(), 4 + 1 + 2 + 4 + 1 + 4 + 2 + 1);
    assert_eq!(&bytes[7..11], &6_i32.to_le_bytes());
    assert_eq!(bytes[11], 0x02);
    assert_eq!(&bytes[12..16], &2_i32.to_le_bytes());
    assert_eq!(&bytes[16..18], &[0xaa, 0xbb]);
}

#[test]
fn test_unordered_map_encodes_in_key_order() {
    let m: M = [("b", 1), ("a", 2), ("c", 3)].into_iter().collect();
    let expected = doc! { "a": 2, "b": 1, "c": 3 };
    assert_eq!(marshal(&m).unwrap(), reference(&expected));
}

#[test]
fn test_ordered_document_keeps_duplicates() {
    let mut d = D::new();
    d.push("x", 1);
    d.push("x", 2);
    let bytes = marshal(&d).unwrap();
    // Two int32 elements: tag + "x\0" + 4 bytes each.
    assert_eq!(bytes.len(), 4 + 2 * 7 + 1);
}

#[test]
fn test_nested_mixed_families() {
    let inner: current::Document = [("k", Value::Int(1))].into_iter().collect();
    let items = vec![
        Value::from("a"),
        Value::Document(inner),
        Value::Array(current::Array::from(vec![Value::Bool(false)])),
    ];
    let m: M = [("list", Value::Slice(items))].into_iter().collect();

    let expected = doc! { "list": ["a", { "k": 1 }, [false]] };
    assert_eq!(marshal(&m).unwrap(), reference(&expected));
}

#[test]
fn test_reference_document_passes_through() {
    let doc = doc! {
        "a": { "b": [1, 2, { "c": "d" }] },
        "when": bson::DateTime::from_millis(1),
    };
    assert_eq!(marshal(&doc).unwrap(), reference(&doc));
}

#[test]
fn test_reference_only_types_match_reference() {
    let doc = doc! {
        "ts": bson::Timestamp { time: 1, increment: 2 },
        "dec": bson::Bson::Decimal128(bson::Decimal128::from_bytes([3; 16])),
        "js": bson::Bson::JavaScriptCode("f()".to_string()),
        "sym": bson::Bson::Symbol("s".to_string()),
        "cws": bson::Bson::JavaScriptCodeWithScope(bson::JavaScriptCodeWithScope {
            code: "g(x)".to_string(),
            scope: doc! { "x": 1 },
        }),
        "u": bson::Bson::Undefined,
        "min": bson::Bson::MinKey,
        "max": bson::Bson::MaxKey,
    };
    let expected = reference(&doc);
    assert_eq!(marshal(&doc).unwrap(), expected);

    let converted = current::Document::try_from(doc).unwrap();
    assert_eq!(marshal(&converted).unwrap(), expected);
}

#[test]
fn test_scalar_value_is_not_a_document() {
    assert!(matches!(
        marshal(&Value::Int32(1)),
        Err(EncodeError::Unsupported(_))
    ));
}

#[test]
fn test_marshal_into_appends() {
    let mut buf = vec![0xff];
    marshal_into(&M::new(), &mut buf).unwrap();
    assert_eq!(buf, vec![0xff, 5, 0, 0, 0, 0]);
}

#[test]
fn test_failed_marshal_into_leaves_buffer_untouched() {
    let mut m = M::new();
    m.insert("a".to_string(), Value::Int(1));
    m.insert("b".to_string(), Value::ObjectId(ObjectId::default()));

    let mut buf = vec![1, 2, 3];
    assert_eq!(
        marshal_into(&m, &mut buf),
        Err(EncodeError::InvalidObjectId { len: 0 })
    );
    assert_eq!(buf, vec![1, 2, 3]);
}
