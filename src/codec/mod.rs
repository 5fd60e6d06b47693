//! Codec core shared by the two front-ends
//!
//! [`Codec`] owns the decode options and runs the entry point's decode: it
//! validates the buffer, builds a fresh destination and only then replaces
//! the caller's value, so a failed decode never leaves a partial result.

use tracing::debug;

use crate::config::CodecConfig;
use crate::current;
use crate::decode::{self, DecodeContext, DecodeOptions, DocumentKind, DocumentReader};
use crate::encode::{self, Marshal};
use crate::error::{DecodeError, EncodeError};
use crate::legacy::{D, M};
use crate::policy::{Destination, Family, Slot};
use crate::value::Value;

/// A destination that a whole BSON document decodes into.
pub trait Unmarshal: Sized {
    fn unmarshal_document(reader: DocumentReader<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError>;
}

/// Encoder and decoder with a fixed set of options.
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec {
    options: DecodeOptions,
}

impl Codec {
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            options: config.decode_options(),
        }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Encode `value` as a BSON document.
    pub fn marshal<T: Marshal + ?Sized>(&self, value: &T) -> Result<Vec<u8>, EncodeError> {
        encode::marshal(value)
    }

    /// Decode `data` through the `family` entry point and replace `out`.
    pub fn unmarshal<T: Unmarshal>(
        &self,
        family: Family,
        data: &[u8],
        out: &mut T,
    ) -> Result<(), DecodeError> {
        debug!("Decoding {} bytes through the {} entry point", data.len(), family);
        let reader = DocumentReader::new(data)?;
        let ctx = DecodeContext::new(family, self.options);
        *out = T::unmarshal_document(reader, &ctx)?;
        Ok(())
    }
}

macro_rules! document_root {
    ($ty:ty, $kind:expr, $decode:path) => {
        /// Locks its own representation for every nested document.
        impl Unmarshal for $ty {
            fn unmarshal_document(
                reader: DocumentReader<'_>,
                ctx: &DecodeContext,
            ) -> Result<Self, DecodeError> {
                $decode(reader, &ctx.lock($kind))
            }
        }
    };
}

document_root!(M, DocumentKind::M, decode::decode_m);
document_root!(D, DocumentKind::D, decode::decode_d);
document_root!(current::Map, DocumentKind::Map, decode::decode_map);
document_root!(
    current::Document,
    DocumentKind::Document,
    decode::decode_current_document
);

/// A generic root takes the entry family's default representation.
impl Unmarshal for Value {
    fn unmarshal_document(reader: DocumentReader<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError> {
        let kind = ctx.document_kind();
        decode::decode_document(kind, reader, &ctx.lock(kind))
    }
}

/// A generic sequence root sets no lock; each element resolves its own.
impl Unmarshal for Vec<Value> {
    fn unmarshal_document(reader: DocumentReader<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError> {
        decode::decode_items(reader, ctx)
    }
}

/// The reference crate's document, built from current-family values.
impl Unmarshal for bson::Document {
    fn unmarshal_document(reader: DocumentReader<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError> {
        let ctx = ctx.lock(DocumentKind::Document);
        let mut doc = bson::Document::new();
        for element in reader {
            let element = element?;
            let value = decode::decode_value(&element, &ctx)?;
            let converted = value.to_bson().map_err(|_| DecodeError::TypeMismatch {
                key: element.key.to_string(),
                wire: element.kind,
                slot: Slot::Any,
                destination: Destination::GenericCurrent,
            })?;
            doc.insert(element.key, converted);
        }
        Ok(doc)
    }
}
