//! BSON encoder
//!
//! [`DocumentWriter`] appends elements to a caller-owned buffer and patches
//! the length prefix when the document is finished. [`Marshal`] is the seam
//! implemented by every top-level document shape; generic values are
//! re-dispatched through [`DocumentWriter::value`] at every depth, so
//! arbitrarily nested mixes of both families encode the same way.

use bson::Bson;
use tracing::debug;

use crate::current;
use crate::error::EncodeError;
use crate::legacy::{D, M};
use crate::policy::{self, ElementType};
use crate::value::Value;

/// A value that encodes as a complete BSON document.
pub trait Marshal {
    /// Write every field of the document into `w`.
    fn write_fields(&self, w: &mut DocumentWriter<'_>) -> Result<(), EncodeError>;
}

/// Encode `value` as a standalone BSON document.
pub fn marshal<T: Marshal + ?Sized>(value: &T) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();
    marshal_into(value, &mut buf)?;
    Ok(buf)
}

/// Append the encoding of `value` to `buf`.
///
/// On error `buf` is restored to its previous length.
pub fn marshal_into<T: Marshal + ?Sized>(value: &T, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
    let start = buf.len();
    let mut w = DocumentWriter::begin(buf);
    let result = value.write_fields(&mut w).and_then(|()| w.finish());
    if let Err(e) = result {
        buf.truncate(start);
        return Err(e);
    }
    debug!("Encoded document of {} bytes", buf.len() - start);
    Ok(())
}

/// Writer for the elements of one (possibly embedded) document.
pub struct DocumentWriter<'a> {
    buf: &'a mut Vec<u8>,
    start: usize,
}

impl<'a> DocumentWriter<'a> {
    /// Reserve the length prefix and start a document at the end of `buf`.
    pub fn begin(buf: &'a mut Vec<u8>) -> Self {
        let start = buf.len();
        buf.extend_from_slice(&[0; 4]);
        Self { buf, start }
    }

    /// Write the terminator and patch the length prefix.
    pub fn finish(self) -> Result<(), EncodeError> {
        self.buf.push(0);
        let len = self.buf.len() - self.start;
        let prefix = i32::try_from(len).map_err(|_| EncodeError::DocumentTooLarge(len))?;
        self.buf[self.start..self.start + 4].copy_from_slice(&prefix.to_le_bytes());
        Ok(())
    }

    fn header(&mut self, wire: ElementType, key: &str) -> Result<(), EncodeError> {
        self.buf.push(wire.tag());
        self.put_cstring(key)
    }

    /* ---------- typed elements ---------- */

    pub fn null(&mut self, key: &str) -> Result<(), EncodeError> {
        self.header(ElementType::Null, key)
    }

    pub fn bool(&mut self, key: &str, b: bool) -> Result<(), EncodeError> {
        self.header(ElementType::Boolean, key)?;
        self.buf.push(u8::from(b));
        Ok(())
    }

    pub fn i32(&mut self, key: &str, n: i32) -> Result<(), EncodeError> {
        self.header(ElementType::Int32, key)?;
        self.buf.extend_from_slice(&n.to_le_bytes());
        Ok(())
    }

    pub fn i64(&mut self, key: &str, n: i64) -> Result<(), EncodeError> {
        self.header(ElementType::Int64, key)?;
        self.buf.extend_from_slice(&n.to_le_bytes());
        Ok(())
    }

    pub fn f64(&mut self, key: &str, f: f64) -> Result<(), EncodeError> {
        self.header(ElementType::Double, key)?;
        self.buf.extend_from_slice(&f.to_le_bytes());
        Ok(())
    }

    pub fn string(&mut self, key: &str, s: &str) -> Result<(), EncodeError> {
        self.header(ElementType::String, key)?;
        self.put_string(s)
    }

    pub fn object_id(&mut self, key: &str, bytes: [u8; 12]) -> Result<(), EncodeError> {
        self.header(ElementType::ObjectId, key)?;
        self.buf.extend_from_slice(&bytes);
        Ok(())
    }

    /// UTC datetime as milliseconds since the Unix epoch.
    pub fn datetime(&mut self, key: &str, millis: i64) -> Result<(), EncodeError> {
        self.header(ElementType::DateTime, key)?;
        self.buf.extend_from_slice(&millis.to_le_bytes());
        Ok(())
    }

    pub fn regex(&mut self, key: &str, pattern: &str, options: &str) -> Result<(), EncodeError> {
        self.header(ElementType::Regex, key)?;
        self.put_regex(pattern, options)
    }

    pub fn binary(&mut self, key: &str, subtype: u8, data: &[u8]) -> Result<(), EncodeError> {
        self.header(ElementType::Binary, key)?;
        self.put_binary(subtype, data)
    }

    /// Internal replication timestamp: increment first, then seconds.
    pub fn timestamp(&mut self, key: &str, ts: bson::Timestamp) -> Result<(), EncodeError> {
        self.header(ElementType::Timestamp, key)?;
        self.put_timestamp(ts);
        Ok(())
    }

    pub fn decimal128(&mut self, key: &str, d: bson::Decimal128) -> Result<(), EncodeError> {
        self.header(ElementType::Decimal128, key)?;
        self.buf.extend_from_slice(&d.bytes());
        Ok(())
    }

    pub fn javascript(&mut self, key: &str, code: &str) -> Result<(), EncodeError> {
        self.header(ElementType::JavaScript, key)?;
        self.put_string(code)
    }

    pub fn symbol(&mut self, key: &str, symbol: &str) -> Result<(), EncodeError> {
        self.header(ElementType::Symbol, key)?;
        self.put_string(symbol)
    }

    pub fn javascript_with_scope(
        &mut self,
        key: &str,
        code: &bson::JavaScriptCodeWithScope,
    ) -> Result<(), EncodeError> {
        self.header(ElementType::JavaScriptWithScope, key)?;
        self.put_code_with_scope(code)
    }

    /// Undefined, MinKey and MaxKey carry no payload.
    pub fn marker(&mut self, key: &str, wire: ElementType) -> Result<(), EncodeError> {
        self.header(wire, key)
    }

    /// Embedded document whose fields are written by `fill`.
    pub fn document<F>(&mut self, key: &str, fill: F) -> Result<(), EncodeError>
    where
        F: FnOnce(&mut DocumentWriter<'_>) -> Result<(), EncodeError>,
    {
        self.header(ElementType::Document, key)?;
        self.put_document(fill)
    }

    pub fn array(&mut self, key: &str, items: &[Value]) -> Result<(), EncodeError> {
        self.header(ElementType::Array, key)?;
        self.put_array(items)
    }

    /// Any generic value, resolved through the policy table.
    pub fn value(&mut self, key: &str, value: &Value) -> Result<(), EncodeError> {
        let wire = match value {
            Value::Int(n) if i32::try_from(*n).is_err() => ElementType::Int64,
            other => policy::wire_type(other.kind()),
        };
        self.header(wire, key)?;

        match value {
            Value::Null => {}
            Value::Bool(b) => self.buf.push(u8::from(*b)),
            Value::Int(n) => match i32::try_from(*n) {
                Ok(small) => self.buf.extend_from_slice(&small.to_le_bytes()),
                Err(_) => self.buf.extend_from_slice(&n.to_le_bytes()),
            },
            Value::Int32(n) => self.buf.extend_from_slice(&n.to_le_bytes()),
            Value::Int64(n) => self.buf.extend_from_slice(&n.to_le_bytes()),
            Value::Double(f) => self.buf.extend_from_slice(&f.to_le_bytes()),
            Value::String(s) => self.put_string(s)?,
            Value::ObjectId(id) => {
                let bytes = id.bytes().ok_or(EncodeError::InvalidObjectId { len: 0 })?;
                self.buf.extend_from_slice(&bytes);
            }
            Value::Oid(oid) => self.buf.extend_from_slice(&oid.bytes()),
            Value::RegEx(r) => self.put_regex(&r.pattern, &r.options)?,
            Value::Regex(r) => self.put_regex(&r.pattern, &r.options)?,
            Value::Time(t) => self.buf.extend_from_slice(&t.timestamp_millis().to_le_bytes()),
            Value::DateTime(dt) => self
                .buf
                .extend_from_slice(&dt.timestamp_millis().to_le_bytes()),
            Value::Binary(b) => self.put_binary(b.kind, &b.data)?,
            Value::BsonBinary(b) => self.put_binary(u8::from(b.subtype), &b.bytes)?,
            Value::M(m) => self.put_document(|w| m.write_fields(w))?,
            Value::D(d) => self.put_document(|w| d.write_fields(w))?,
            Value::Map(m) => self.put_document(|w| m.write_fields(w))?,
            Value::Document(d) => self.put_document(|w| d.write_fields(w))?,
            Value::Slice(items) => self.put_array(items)?,
            Value::Array(a) => self.put_array(a)?,
            Value::JavaScript(code) | Value::Symbol(code) => self.put_string(code)?,
            Value::JavaScriptWithScope(code) => self.put_code_with_scope(code)?,
            Value::Timestamp(ts) => self.put_timestamp(*ts),
            Value::Decimal128(d) => self.buf.extend_from_slice(&d.bytes()),
            Value::Undefined | Value::MinKey | Value::MaxKey => {}
        }
        Ok(())
    }

    /// A reference-crate value, written without conversion.
    pub fn bson(&mut self, key: &str, value: &Bson) -> Result<(), EncodeError> {
        match value {
            Bson::Null => self.null(key),
            Bson::Boolean(b) => self.bool(key, *b),
            Bson::Int32(n) => self.i32(key, *n),
            Bson::Int64(n) => self.i64(key, *n),
            Bson::Double(f) => self.f64(key, *f),
            Bson::String(s) => self.string(key, s),
            Bson::ObjectId(oid) => self.object_id(key, oid.bytes()),
            Bson::RegularExpression(r) => self.regex(key, &r.pattern, &r.options),
            Bson::DateTime(dt) => self.datetime(key, dt.timestamp_millis()),
            Bson::Binary(b) => self.binary(key, u8::from(b.subtype), &b.bytes),
            Bson::Document(doc) => self.document(key, |w| doc.write_fields(w)),
            Bson::Array(items) => {
                self.header(ElementType::Array, key)?;
                let mut inner = DocumentWriter::begin(self.buf);
                for (i, item) in items.iter().enumerate() {
                    inner.bson(&i.to_string(), item)?;
                }
                inner.finish()
            }
            Bson::Timestamp(ts) => self.timestamp(key, *ts),
            Bson::Decimal128(d) => self.decimal128(key, *d),
            Bson::JavaScriptCode(code) => self.javascript(key, code),
            Bson::Symbol(s) => self.symbol(key, s),
            Bson::JavaScriptCodeWithScope(code) => self.javascript_with_scope(key, code),
            Bson::Undefined => self.marker(key, ElementType::Undefined),
            Bson::MinKey => self.marker(key, ElementType::MinKey),
            Bson::MaxKey => self.marker(key, ElementType::MaxKey),
            other => Err(EncodeError::Unsupported(format!(
                "{:?} in field '{key}'",
                other.element_type()
            ))),
        }
    }

    /* ---------- payloads ---------- */

    fn put_cstring(&mut self, s: &str) -> Result<(), EncodeError> {
        if s.as_bytes().contains(&0) {
            return Err(EncodeError::InteriorNul(s.to_string()));
        }
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
        Ok(())
    }

    fn put_string(&mut self, s: &str) -> Result<(), EncodeError> {
        let len = s.len() + 1;
        let prefix = i32::try_from(len).map_err(|_| EncodeError::DocumentTooLarge(len))?;
        self.buf.extend_from_slice(&prefix.to_le_bytes());
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
        Ok(())
    }

    fn put_regex(&mut self, pattern: &str, options: &str) -> Result<(), EncodeError> {
        self.put_cstring(pattern)?;
        self.put_cstring(&current::sort_regex_options(options))
    }

    fn put_binary(&mut self, subtype: u8, data: &[u8]) -> Result<(), EncodeError> {
        // The old binary subtype nests a second length prefix inside the payload.
        let inner = if subtype == 0x02 { 4 } else { 0 };
        let len = data.len() + inner;
        let prefix = i32::try_from(len).map_err(|_| EncodeError::DocumentTooLarge(len))?;
        self.buf.extend_from_slice(&prefix.to_le_bytes());
        self.buf.push(subtype);
        if inner > 0 {
            self.buf
                .extend_from_slice(&(data.len() as i32).to_le_bytes());
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    fn put_timestamp(&mut self, ts: bson::Timestamp) {
        self.buf.extend_from_slice(&ts.increment.to_le_bytes());
        self.buf.extend_from_slice(&ts.time.to_le_bytes());
    }

    fn put_code_with_scope(&mut self, code: &bson::JavaScriptCodeWithScope) -> Result<(), EncodeError> {
        let start = self.buf.len();
        self.buf.extend_from_slice(&[0; 4]);
        self.put_string(&code.code)?;
        self.put_document(|w| code.scope.write_fields(w))?;
        let len = self.buf.len() - start;
        let prefix = i32::try_from(len).map_err(|_| EncodeError::DocumentTooLarge(len))?;
        self.buf[start..start + 4].copy_from_slice(&prefix.to_le_bytes());
        Ok(())
    }

    fn put_document<F>(&mut self, fill: F) -> Result<(), EncodeError>
    where
        F: FnOnce(&mut DocumentWriter<'_>) -> Result<(), EncodeError>,
    {
        let mut inner = DocumentWriter::begin(self.buf);
        fill(&mut inner)?;
        inner.finish()
    }

    fn put_array(&mut self, items: &[Value]) -> Result<(), EncodeError> {
        let mut inner = DocumentWriter::begin(self.buf);
        for (i, item) in items.iter().enumerate() {
            inner.value(&i.to_string(), item)?;
        }
        inner.finish()
    }
}

/* ========================= Marshal impls ========================= */

impl Marshal for M {
    fn write_fields(&self, w: &mut DocumentWriter<'_>) -> Result<(), EncodeError> {
        for (key, value) in self.iter() {
            w.value(key, value)?;
        }
        Ok(())
    }
}

impl Marshal for D {
    fn write_fields(&self, w: &mut DocumentWriter<'_>) -> Result<(), EncodeError> {
        for elem in self.iter() {
            w.value(&elem.name, &elem.value)?;
        }
        Ok(())
    }
}

impl Marshal for current::Map {
    fn write_fields(&self, w: &mut DocumentWriter<'_>) -> Result<(), EncodeError> {
        for (key, value) in self.iter() {
            w.value(key, value)?;
        }
        Ok(())
    }
}

impl Marshal for current::Document {
    fn write_fields(&self, w: &mut DocumentWriter<'_>) -> Result<(), EncodeError> {
        for entry in self.iter() {
            w.value(&entry.key, &entry.value)?;
        }
        Ok(())
    }
}

impl Marshal for bson::Document {
    fn write_fields(&self, w: &mut DocumentWriter<'_>) -> Result<(), EncodeError> {
        for (key, value) in self.iter() {
            w.bson(key, value)?;
        }
        Ok(())
    }
}

impl Marshal for Value {
    fn write_fields(&self, w: &mut DocumentWriter<'_>) -> Result<(), EncodeError> {
        match self {
            Value::M(m) => m.write_fields(w),
            Value::D(d) => d.write_fields(w),
            Value::Map(m) => m.write_fields(w),
            Value::Document(d) => d.write_fields(w),
            other => Err(EncodeError::Unsupported(format!(
                "{:?} cannot be encoded as a top-level document",
                other.kind()
            ))),
        }
    }
}

#[cfg(test)]
mod tests;
