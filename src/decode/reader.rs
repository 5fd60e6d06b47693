//! Zero-copy BSON document reader
//!
//! [`DocumentReader`] walks the elements of one document without copying.
//! Every length prefix and terminator is checked before an [`Element`] is
//! handed out, so the typed accessors only have to interpret bytes that are
//! known to be in bounds.

use std::borrow::Cow;

use crate::error::DecodeError;
use crate::policy::ElementType;

/// Smallest valid document: length prefix plus terminator.
const MIN_DOCUMENT_LEN: usize = 5;

/// Iterator over the elements of a single BSON document.
#[derive(Debug, Clone)]
pub struct DocumentReader<'a> {
    data: &'a [u8],
    pos: usize,
    /// Index of the terminating zero byte.
    end: usize,
    done: bool,
}

impl<'a> DocumentReader<'a> {
    /// Start reading a document that must span exactly `data`.
    pub fn new(data: &'a [u8]) -> Result<Self, DecodeError> {
        if data.len() < MIN_DOCUMENT_LEN {
            return Err(DecodeError::Truncated {
                needed: MIN_DOCUMENT_LEN,
                remaining: data.len(),
            });
        }
        let declared = read_len(data, 0)?;
        if declared != data.len() {
            return Err(DecodeError::Malformed(format!(
                "document declares {} bytes but {} were given",
                declared,
                data.len()
            )));
        }
        let end = data.len() - 1;
        if data[end] != 0 {
            return Err(DecodeError::Malformed(
                "document is missing its terminator".to_string(),
            ));
        }
        Ok(Self {
            data,
            pos: 4,
            end,
            done: false,
        })
    }

    /// Bytes of the whole document, including length prefix and terminator.
    pub fn bytes(&self) -> &'a [u8] {
        self.data
    }

    fn next_element(&mut self) -> Result<Element<'a>, DecodeError> {
        let tag = self.data[self.pos];
        if tag == 0 {
            return Err(DecodeError::Malformed(format!(
                "terminator at offset {} before the end of the document",
                self.pos
            )));
        }
        let key_start = self.pos + 1;
        let key_bytes = cstring(self.data, key_start, self.end)?;
        let key = std::str::from_utf8(key_bytes).map_err(|_| DecodeError::InvalidUtf8 {
            key: String::from_utf8_lossy(key_bytes).into_owned(),
        })?;
        let value_start = key_start + key_bytes.len() + 1;

        let kind = ElementType::from_tag(tag).ok_or_else(|| DecodeError::UnsupportedElement {
            key: key.to_string(),
            tag,
        })?;

        let size = self.payload_len(kind, value_start)?;
        let remaining = self.end - value_start;
        if size > remaining {
            return Err(DecodeError::Truncated {
                needed: size,
                remaining,
            });
        }
        let payload = &self.data[value_start..value_start + size];
        self.pos = value_start + size;

        let element = Element { key, kind, payload };
        element.validate()?;
        Ok(element)
    }

    /// Size of the payload starting at `at`, derived from the element type.
    fn payload_len(&self, kind: ElementType, at: usize) -> Result<usize, DecodeError> {
        Ok(match kind {
            ElementType::Double
            | ElementType::DateTime
            | ElementType::Int64
            | ElementType::Timestamp => 8,
            ElementType::Int32 => 4,
            ElementType::ObjectId => 12,
            ElementType::Decimal128 => 16,
            ElementType::Boolean => 1,
            ElementType::Null
            | ElementType::Undefined
            | ElementType::MinKey
            | ElementType::MaxKey => 0,
            ElementType::String | ElementType::JavaScript | ElementType::Symbol => {
                self.string_len(at)?
            }
            ElementType::DbPointer => self.string_len(at)? + 12,
            ElementType::JavaScriptWithScope => {
                let len = self.prefix(at)?;
                // total length, string length, terminator, then an empty document at least
                if len < 4 + 4 + 1 + MIN_DOCUMENT_LEN {
                    return Err(DecodeError::Malformed(format!(
                        "code with scope length {len} is too small"
                    )));
                }
                len
            }
            ElementType::Document | ElementType::Array => {
                let len = self.prefix(at)?;
                if len < MIN_DOCUMENT_LEN {
                    return Err(DecodeError::Malformed(format!(
                        "embedded document length {len} is too small"
                    )));
                }
                len
            }
            ElementType::Binary => 4 + 1 + self.prefix(at)?,
            ElementType::Regex => {
                let pattern = cstring(self.data, at, self.end)?;
                let options = cstring(self.data, at + pattern.len() + 1, self.end)?;
                pattern.len() + 1 + options.len() + 1
            }
        })
    }

    /// Length prefix plus bytes of a string payload starting at `at`.
    fn string_len(&self, at: usize) -> Result<usize, DecodeError> {
        let len = self.prefix(at)?;
        if len == 0 {
            return Err(DecodeError::Malformed(
                "string length must include its terminator".to_string(),
            ));
        }
        Ok(4 + len)
    }

    fn prefix(&self, at: usize) -> Result<usize, DecodeError> {
        if at + 4 > self.end {
            return Err(DecodeError::Truncated {
                needed: 4,
                remaining: self.end.saturating_sub(at),
            });
        }
        read_len(self.data, at)
    }
}

impl<'a> Iterator for DocumentReader<'a> {
    type Item = Result<Element<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.end {
            return None;
        }
        let result = self.next_element();
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

/// A single element: its key, wire type and raw payload.
#[derive(Debug, Clone, Copy)]
pub struct Element<'a> {
    pub key: &'a str,
    pub kind: ElementType,
    pub payload: &'a [u8],
}

impl<'a> Element<'a> {
    /// Checks that need the payload itself, run once by the reader.
    fn validate(&self) -> Result<(), DecodeError> {
        match self.kind {
            ElementType::String | ElementType::JavaScript | ElementType::Symbol
                if self.payload.last() != Some(&0) =>
            {
                Err(DecodeError::Malformed(format!(
                    "string '{}' is not terminated",
                    self.key
                )))
            }
            ElementType::DbPointer if self.payload[self.payload.len() - 13] != 0 => Err(
                DecodeError::Malformed(format!("namespace of '{}' is not terminated", self.key)),
            ),
            ElementType::Boolean if self.payload[0] > 1 => Err(DecodeError::Malformed(
                format!("invalid boolean byte {:#04x} in '{}'", self.payload[0], self.key),
            )),
            _ => Ok(()),
        }
    }

    fn fixed<const N: usize>(&self) -> Result<[u8; N], DecodeError> {
        self.payload.try_into().map_err(|_| {
            DecodeError::Malformed(format!(
                "'{}' holds {} bytes where {} were expected",
                self.key,
                self.payload.len(),
                N
            ))
        })
    }

    pub fn as_f64(&self) -> Result<f64, DecodeError> {
        Ok(f64::from_le_bytes(self.fixed()?))
    }

    pub fn as_i32(&self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.fixed()?))
    }

    pub fn as_i64(&self) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.fixed()?))
    }

    pub fn as_bool(&self) -> Result<bool, DecodeError> {
        let [b] = self.fixed::<1>()?;
        Ok(b == 1)
    }

    pub fn as_object_id(&self) -> Result<[u8; 12], DecodeError> {
        self.fixed()
    }

    /// Milliseconds since the Unix epoch.
    pub fn as_datetime_millis(&self) -> Result<i64, DecodeError> {
        self.as_i64()
    }

    /// Increment and time of an internal replication timestamp.
    pub fn as_timestamp(&self) -> Result<bson::Timestamp, DecodeError> {
        let raw: [u8; 8] = self.fixed()?;
        let [i0, i1, i2, i3, t0, t1, t2, t3] = raw;
        Ok(bson::Timestamp {
            increment: u32::from_le_bytes([i0, i1, i2, i3]),
            time: u32::from_le_bytes([t0, t1, t2, t3]),
        })
    }

    pub fn as_decimal128(&self) -> Result<bson::Decimal128, DecodeError> {
        Ok(bson::Decimal128::from_bytes(self.fixed()?))
    }

    /// Code and scope of a javascript-with-scope element.
    pub fn as_code_with_scope(&self) -> Result<(&'a str, DocumentReader<'a>), DecodeError> {
        let total = read_len(self.payload, 0)?;
        if total != self.payload.len() {
            return Err(DecodeError::Malformed(format!(
                "code with scope '{}' declares {} bytes but holds {}",
                self.key,
                total,
                self.payload.len()
            )));
        }
        let len = read_len(self.payload, 4)?;
        let code_end = 8 + len;
        if len == 0 || code_end > total || self.payload[code_end - 1] != 0 {
            return Err(DecodeError::Malformed(format!(
                "code of '{}' is not terminated",
                self.key
            )));
        }
        let code = std::str::from_utf8(&self.payload[8..code_end - 1]).map_err(|_| {
            DecodeError::InvalidUtf8 {
                key: self.key.to_string(),
            }
        })?;
        Ok((code, DocumentReader::new(&self.payload[code_end..])?))
    }

    /// String payload; with `lossy`, invalid UTF-8 is replaced instead of rejected.
    pub fn as_str(&self, lossy: bool) -> Result<Cow<'a, str>, DecodeError> {
        let bytes = &self.payload[4..self.payload.len() - 1];
        if lossy {
            return Ok(String::from_utf8_lossy(bytes));
        }
        std::str::from_utf8(bytes)
            .map(Cow::Borrowed)
            .map_err(|_| DecodeError::InvalidUtf8 {
                key: self.key.to_string(),
            })
    }

    /// Pattern and options of a regex element.
    pub fn as_regex(&self) -> Result<(&'a str, &'a str), DecodeError> {
        let split = self
            .payload
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| DecodeError::Malformed(format!("regex '{}' is not terminated", self.key)))?;
        let pattern = &self.payload[..split];
        let options = &self.payload[split + 1..self.payload.len() - 1];
        let utf8 = |bytes: &'a [u8]| {
            std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 {
                key: self.key.to_string(),
            })
        };
        Ok((utf8(pattern)?, utf8(options)?))
    }

    /// Subtype and data of a binary element, unwrapping the old-binary inner length.
    pub fn as_binary(&self) -> Result<(u8, &'a [u8]), DecodeError> {
        let subtype = self.payload[4];
        let data = &self.payload[5..];
        if subtype != 0x02 {
            return Ok((subtype, data));
        }
        if data.len() < 4 {
            return Err(DecodeError::Truncated {
                needed: 4,
                remaining: data.len(),
            });
        }
        let inner = read_len(data, 0)?;
        if inner != data.len() - 4 {
            return Err(DecodeError::Malformed(format!(
                "old binary '{}' declares {} bytes but holds {}",
                self.key,
                inner,
                data.len() - 4
            )));
        }
        Ok((subtype, &data[4..]))
    }

    pub fn as_document(&self) -> Result<DocumentReader<'a>, DecodeError> {
        DocumentReader::new(self.payload)
    }

    /// Array elements are read as a document; their keys are ignored.
    pub fn as_array(&self) -> Result<DocumentReader<'a>, DecodeError> {
        DocumentReader::new(self.payload)
    }
}

fn read_len(data: &[u8], at: usize) -> Result<usize, DecodeError> {
    let bytes: [u8; 4] = data
        .get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .ok_or(DecodeError::Truncated {
            needed: 4,
            remaining: data.len().saturating_sub(at),
        })?;
    let len = i32::from_le_bytes(bytes);
    usize::try_from(len).map_err(|_| DecodeError::Malformed(format!("negative length {len}")))
}

/// The bytes of a NUL-terminated string starting at `start`, without the NUL.
fn cstring(data: &[u8], start: usize, end: usize) -> Result<&[u8], DecodeError> {
    let window = data.get(start..end).ok_or(DecodeError::Truncated {
        needed: 1,
        remaining: 0,
    })?;
    let len = window
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| DecodeError::Malformed("unterminated cstring".to_string()))?;
    Ok(&window[..len])
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

    #[test]
    fn test_reads_elements_in_order() {
        let data = bytes(&doc! { "a": 1, "b": "two", "c": { "d": true } });
        let elements: Vec<_> = DocumentReader::new(&data)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].key, "a");
        assert_eq!(elements[0].as_i32().unwrap(), 1);
        assert_eq!(elements[1].as_str(false).unwrap(), "two");
        let inner: Vec<_> = elements[2]
            .as_document()
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(inner[0].as_bool().unwrap());
    }

    #[test]
    fn test_empty_document() {
        let mut reader = DocumentReader::new(&[5, 0, 0, 0, 0]).unwrap();
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_rejects_short_buffer() {
        assert!(matches!(
            DocumentReader::new(&[5, 0, 0]),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let mut data = bytes(&doc! { "a": 1 });
        data.push(0);
        assert!(matches!(
            DocumentReader::new(&data),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_rejects_missing_terminator() {
        let mut data = bytes(&doc! { "a": 1 });
        let last = data.len() - 1;
        data[last] = 1;
        assert!(matches!(
            DocumentReader::new(&data),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_truncated_element_is_reported() {
        // Claims a string of 100 bytes inside a tiny document.
        let data = [
            14, 0, 0, 0, 0x02, b'a', 0, 100, 0, 0, 0, b'x', 0, 0,
        ];
        let mut reader = DocumentReader::new(&data).unwrap();
        assert!(matches!(
            reader.next(),
            Some(Err(DecodeError::Truncated { .. }))
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_unknown_tag_is_reported() {
        let data = [8, 0, 0, 0, 0x20, b'x', 0, 0];
        let err = DocumentReader::new(&data)
            .unwrap()
            .next()
            .unwrap()
            .unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnsupportedElement {
                key: "x".to_string(),
                tag: 0x20
            }
        );
    }

    #[test]
    fn test_reads_every_standard_element() {
        let data = bytes(&doc! {
            "ts": bson::Timestamp { time: 1, increment: 2 },
            "dec": bson::Bson::Decimal128(bson::Decimal128::from_bytes([9; 16])),
            "js": bson::Bson::JavaScriptCode("f()".to_string()),
            "sym": bson::Bson::Symbol("s".to_string()),
            "cws": bson::Bson::JavaScriptCodeWithScope(bson::JavaScriptCodeWithScope {
                code: "g(x)".to_string(),
                scope: doc! { "x": 1 },
            }),
            "u": bson::Bson::Undefined,
            "min": bson::Bson::MinKey,
            "max": bson::Bson::MaxKey,
            "after": true,
        });
        let elements: Vec<_> = DocumentReader::new(&data)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(elements.len(), 9);
        assert_eq!(
            elements[0].as_timestamp().unwrap(),
            bson::Timestamp { time: 1, increment: 2 }
        );
        assert_eq!(elements[1].as_decimal128().unwrap().bytes(), [9; 16]);
        assert_eq!(elements[2].as_str(false).unwrap(), "f()");
        assert_eq!(elements[3].as_str(false).unwrap(), "s");
        let (code, scope) = elements[4].as_code_with_scope().unwrap();
        assert_eq!(code, "g(x)");
        assert_eq!(scope.count(), 1);
        assert_eq!(elements[5].kind, ElementType::Undefined);
        assert_eq!(elements[6].kind, ElementType::MinKey);
        assert_eq!(elements[7].kind, ElementType::MaxKey);
        assert!(elements[8].as_bool().unwrap());
    }

    #[test]
    fn test_db_pointer_payload_is_skipped() {
        // {"p": DBPointer("a", 12 bytes), "n": 1}
        let mut data = vec![0, 0, 0, 0, 0x0C, b'p', 0, 2, 0, 0, 0, b'a', 0];
        data.extend_from_slice(&[0x11; 12]);
        data.extend_from_slice(&[0x10, b'n', 0, 1, 0, 0, 0, 0]);
        let len = data.len() as u32;
        data[..4].copy_from_slice(&len.to_le_bytes());

        let elements: Vec<_> = DocumentReader::new(&data)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(elements[0].kind, ElementType::DbPointer);
        assert_eq!(elements[0].payload.len(), 4 + 2 + 12);
        assert_eq!(elements[1].as_i32().unwrap(), 1);
    }

    #[test]
    fn test_invalid_boolean_byte() {
        let data = [9, 0, 0, 0, 0x08, b'b', 0, 2, 0];
        let err = DocumentReader::new(&data).unwrap().next().unwrap().unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_invalid_utf8_string() {
        let data = [
            15, 0, 0, 0, 0x02, b's', 0, 3, 0, 0, 0, 0xff, 0xfe, 0, 0,
        ];
        let element = DocumentReader::new(&data).unwrap().next().unwrap().unwrap();
        assert!(matches!(
            element.as_str(false),
            Err(DecodeError::InvalidUtf8 { .. })
        ));
        assert_eq!(element.as_str(true).unwrap(), "\u{fffd}\u{fffd}");
    }

    #[test]
    fn test_regex_and_binary_payloads() {
        let data = bytes(&doc! {
            "re": bson::Regex { pattern: "^x".to_string(), options: "i".to_string() },
            "bin": bson::Binary { subtype: bson::spec::BinarySubtype::Generic, bytes: vec![7, 8] },
        });
        let elements: Vec<_> = DocumentReader::new(&data)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(elements[0].as_regex().unwrap(), ("^x", "i"));
        assert_eq!(elements[1].as_binary().unwrap(), (0x00, &[7u8, 8][..]));
    }

    #[test]
    fn test_old_binary_inner_length() {
        // outer len 6, subtype 2, inner len 2, data aa bb
        let data = [
            19, 0, 0, 0, 0x05, b'b', 0, 6, 0, 0, 0, 0x02, 2, 0, 0, 0, 0xaa, 0xbb, 0,
        ];
        let element = DocumentReader::new(&data).unwrap().next().unwrap().unwrap();
        assert_eq!(element.as_binary().unwrap(), (0x02, &[0xaa, 0xbb][..]));
    }
}
