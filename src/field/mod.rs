//! Structural fields
//!
//! [`Field`] is implemented by every type that may appear as a named field of
//! a [`structural!`](crate::structural) document. Each implementation declares
//! its [`Slot`] and, for family-typed fields, its [`Family`]; decoding asks
//! the coercion table whether the wire element may be assigned, converted or
//! must be rejected, then performs the conversion.

use chrono::{DateTime, Utc};

use crate::current;
use crate::decode::{self, DecodeContext, DocumentKind, Element};
use crate::encode::{DocumentWriter, Marshal};
use crate::error::{DecodeError, EncodeError};
use crate::legacy::{self, D, M};
use crate::policy::{self, Coercion, Destination, ElementType, Family, Slot};
use crate::value::Value;

/// Per-field encoding flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldOptions {
    /// Skip the field when its value is empty.
    pub omit_empty: bool,
    /// Write 64-bit integers as Int32 when they fit.
    pub min_size: bool,
}

impl FieldOptions {
    pub const NONE: FieldOptions = FieldOptions {
        omit_empty: false,
        min_size: false,
    };

    pub const fn omitempty(self) -> Self {
        Self {
            omit_empty: true,
            ..self
        }
    }

    pub const fn minsize(self) -> Self {
        Self {
            min_size: true,
            ..self
        }
    }
}

/// A value that can be stored in a named field of a structural document.
pub trait Field: Sized {
    /// Shape the field declares to the coercion table.
    const SLOT: Slot;
    /// Family of the field's own type; `None` for family-neutral types.
    const FAMILY: Option<Family>;

    /// Value of an absent field.
    fn zero() -> Self;

    /// Whether `omitempty` skips this value.
    fn is_empty(&self) -> bool;

    fn write(
        &self,
        key: &str,
        w: &mut DocumentWriter<'_>,
        options: FieldOptions,
    ) -> Result<(), EncodeError>;

    fn from_element(element: &Element<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError>;
}

/// Write `value` under `key`, honouring `omitempty`.
pub fn write_field<T: Field>(
    w: &mut DocumentWriter<'_>,
    key: &str,
    value: &T,
    options: FieldOptions,
) -> Result<(), EncodeError> {
    if options.omit_empty && value.is_empty() {
        return Ok(());
    }
    value.write(key, w, options)
}

fn destination<T: Field>(ctx: &DecodeContext) -> Destination {
    T::FAMILY
        .map(Destination::structural)
        .unwrap_or_else(|| ctx.structural())
}

fn coerce<T: Field>(element: &Element<'_>, ctx: &DecodeContext) -> Result<Coercion, DecodeError> {
    policy::check(element.key, element.kind, T::SLOT, destination::<T>(ctx))
}

fn mismatch<T: Field>(element: &Element<'_>, ctx: &DecodeContext) -> DecodeError {
    DecodeError::TypeMismatch {
        key: element.key.to_string(),
        wire: element.kind,
        slot: T::SLOT,
        destination: destination::<T>(ctx),
    }
}

/// Accept a double only when it is integral and within `[min, max)`.
fn integral<T: Field>(
    element: &Element<'_>,
    ctx: &DecodeContext,
    min: f64,
    max: f64,
) -> Result<i64, DecodeError> {
    let f = element.as_f64()?;
    if f.fract() != 0.0 {
        return Err(mismatch::<T>(element, ctx));
    }
    if f < min || f >= max {
        return Err(DecodeError::IntegerOverflow {
            key: element.key.to_string(),
            value: f as i64,
        });
    }
    Ok(f as i64)
}

/* ========================= Identifiers ========================= */

impl Field for legacy::ObjectId {
    const SLOT: Slot = Slot::Identifier;
    const FAMILY: Option<Family> = Some(Family::Legacy);

    fn zero() -> Self {
        Self::default()
    }

    fn is_empty(&self) -> bool {
        legacy::ObjectId::is_empty(self)
    }

    fn write(&self, key: &str, w: &mut DocumentWriter<'_>, _: FieldOptions) -> Result<(), EncodeError> {
        let bytes = self.bytes().ok_or(EncodeError::InvalidObjectId { len: 0 })?;
        w.object_id(key, bytes)
    }

    fn from_element(element: &Element<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError> {
        coerce::<Self>(element, ctx)?;
        match element.kind {
            ElementType::ObjectId => Ok(Self::from_bytes(element.as_object_id()?)),
            ElementType::String => Self::from_hex(&element.as_str(false)?),
            ElementType::Null => Ok(Self::default()),
            _ => Err(mismatch::<Self>(element, ctx)),
        }
    }
}

impl Field for current::ObjectId {
    const SLOT: Slot = Slot::Identifier;
    const FAMILY: Option<Family> = Some(Family::Current);

    fn zero() -> Self {
        Self::from_bytes([0; 12])
    }

    fn is_empty(&self) -> bool {
        self.bytes() == [0; 12]
    }

    fn write(&self, key: &str, w: &mut DocumentWriter<'_>, _: FieldOptions) -> Result<(), EncodeError> {
        w.object_id(key, self.bytes())
    }

    fn from_element(element: &Element<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError> {
        coerce::<Self>(element, ctx)?;
        match element.kind {
            ElementType::ObjectId => Ok(Self::from_bytes(element.as_object_id()?)),
            ElementType::String => {
                let hex = element.as_str(false)?;
                Self::parse_str(&hex).map_err(|_| DecodeError::InvalidObjectIdHex(hex.into_owned()))
            }
            _ => Err(mismatch::<Self>(element, ctx)),
        }
    }
}

/* ========================= Regular expressions ========================= */

impl Field for legacy::RegEx {
    const SLOT: Slot = Slot::Regex;
    const FAMILY: Option<Family> = Some(Family::Legacy);

    fn zero() -> Self {
        Self::default()
    }

    fn is_empty(&self) -> bool {
        self.pattern.is_empty() && self.options.is_empty()
    }

    fn write(&self, key: &str, w: &mut DocumentWriter<'_>, _: FieldOptions) -> Result<(), EncodeError> {
        w.regex(key, &self.pattern, &self.options)
    }

    fn from_element(element: &Element<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError> {
        coerce::<Self>(element, ctx)?;
        match element.kind {
            ElementType::Regex => {
                let (pattern, options) = element.as_regex()?;
                Ok(Self::new(pattern, options))
            }
            ElementType::Null => Ok(Self::default()),
            _ => Err(mismatch::<Self>(element, ctx)),
        }
    }
}

impl Field for current::Regex {
    const SLOT: Slot = Slot::Regex;
    const FAMILY: Option<Family> = Some(Family::Current);

    fn zero() -> Self {
        Self {
            pattern: String::new(),
            options: String::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.pattern.is_empty() && self.options.is_empty()
    }

    fn write(&self, key: &str, w: &mut DocumentWriter<'_>, _: FieldOptions) -> Result<(), EncodeError> {
        w.regex(key, &self.pattern, &self.options)
    }

    fn from_element(element: &Element<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError> {
        coerce::<Self>(element, ctx)?;
        match element.kind {
            ElementType::Regex => {
                let (pattern, options) = element.as_regex()?;
                Ok(Self {
                    pattern: pattern.to_string(),
                    options: options.to_string(),
                })
            }
            _ => Err(mismatch::<Self>(element, ctx)),
        }
    }
}

/* ========================= Times ========================= */

impl Field for DateTime<Utc> {
    const SLOT: Slot = Slot::Time;
    const FAMILY: Option<Family> = Some(Family::Legacy);

    fn zero() -> Self {
        DateTime::<Utc>::default()
    }

    fn is_empty(&self) -> bool {
        *self == DateTime::<Utc>::default()
    }

    fn write(&self, key: &str, w: &mut DocumentWriter<'_>, _: FieldOptions) -> Result<(), EncodeError> {
        w.datetime(key, self.timestamp_millis())
    }

    fn from_element(element: &Element<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError> {
        coerce::<Self>(element, ctx)?;
        match element.kind {
            ElementType::DateTime => decode::time_from_millis(element.as_datetime_millis()?),
            ElementType::Null => Ok(Self::zero()),
            _ => Err(mismatch::<Self>(element, ctx)),
        }
    }
}

impl Field for current::DateTime {
    const SLOT: Slot = Slot::Time;
    const FAMILY: Option<Family> = Some(Family::Current);

    fn zero() -> Self {
        Self::from_millis(0)
    }

    fn is_empty(&self) -> bool {
        self.timestamp_millis() == 0
    }

    fn write(&self, key: &str, w: &mut DocumentWriter<'_>, _: FieldOptions) -> Result<(), EncodeError> {
        w.datetime(key, self.timestamp_millis())
    }

    fn from_element(element: &Element<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError> {
        coerce::<Self>(element, ctx)?;
        match element.kind {
            ElementType::DateTime => Ok(Self::from_millis(element.as_datetime_millis()?)),
            _ => Err(mismatch::<Self>(element, ctx)),
        }
    }
}

/* ========================= Binary ========================= */

impl Field for legacy::Binary {
    const SLOT: Slot = Slot::Binary;
    const FAMILY: Option<Family> = Some(Family::Legacy);

    fn zero() -> Self {
        Self::default()
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn write(&self, key: &str, w: &mut DocumentWriter<'_>, _: FieldOptions) -> Result<(), EncodeError> {
        w.binary(key, self.kind, &self.data)
    }

    fn from_element(element: &Element<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError> {
        coerce::<Self>(element, ctx)?;
        match element.kind {
            ElementType::Binary => {
                let (kind, data) = element.as_binary()?;
                Ok(Self {
                    kind,
                    data: data.to_vec(),
                })
            }
            ElementType::Null => Ok(Self::default()),
            _ => Err(mismatch::<Self>(element, ctx)),
        }
    }
}

impl Field for current::Binary {
    const SLOT: Slot = Slot::Binary;
    const FAMILY: Option<Family> = Some(Family::Current);

    fn zero() -> Self {
        Self {
            subtype: bson::spec::BinarySubtype::Generic,
            bytes: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn write(&self, key: &str, w: &mut DocumentWriter<'_>, _: FieldOptions) -> Result<(), EncodeError> {
        w.binary(key, u8::from(self.subtype), &self.bytes)
    }

    fn from_element(element: &Element<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError> {
        coerce::<Self>(element, ctx)?;
        match element.kind {
            ElementType::Binary => {
                let (subtype, data) = element.as_binary()?;
                Ok(Self {
                    subtype: bson::spec::BinarySubtype::from(subtype),
                    bytes: data.to_vec(),
                })
            }
            _ => Err(mismatch::<Self>(element, ctx)),
        }
    }
}

/* ========================= Documents and sequences ========================= */

macro_rules! document_field {
    ($ty:ty, $slot:expr, $family:expr, $kind:expr, $decode:path) => {
        impl Field for $ty {
            const SLOT: Slot = $slot;
            const FAMILY: Option<Family> = Some($family);

            fn zero() -> Self {
                Self::new()
            }

            fn is_empty(&self) -> bool {
                self.len() == 0
            }

            fn write(
                &self,
                key: &str,
                w: &mut DocumentWriter<'_>,
                _: FieldOptions,
            ) -> Result<(), EncodeError> {
                w.document(key, |inner| self.write_fields(inner))
            }

            fn from_element(element: &Element<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError> {
                coerce::<Self>(element, ctx)?;
                match element.kind {
                    ElementType::Document => {
                        let inner = ctx.descend()?.lock($kind);
                        $decode(element.as_document()?, &inner)
                    }
                    ElementType::Null => Ok(Self::new()),
                    _ => Err(mismatch::<Self>(element, ctx)),
                }
            }
        }
    };
}

document_field!(M, Slot::UnorderedDocument, Family::Legacy, DocumentKind::M, decode::decode_m);
document_field!(D, Slot::OrderedDocument, Family::Legacy, DocumentKind::D, decode::decode_d);
document_field!(
    current::Map,
    Slot::UnorderedDocument,
    Family::Current,
    DocumentKind::Map,
    decode::decode_map
);
document_field!(
    current::Document,
    Slot::OrderedDocument,
    Family::Current,
    DocumentKind::Document,
    decode::decode_current_document
);

impl Field for Vec<Value> {
    const SLOT: Slot = Slot::Sequence;
    const FAMILY: Option<Family> = Some(Family::Legacy);

    fn zero() -> Self {
        Vec::new()
    }

    fn is_empty(&self) -> bool {
        Vec::is_empty(self)
    }

    fn write(&self, key: &str, w: &mut DocumentWriter<'_>, _: FieldOptions) -> Result<(), EncodeError> {
        w.array(key, self)
    }

    fn from_element(element: &Element<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError> {
        coerce::<Self>(element, ctx)?;
        match element.kind {
            ElementType::Array => decode::decode_items(element.as_array()?, &ctx.descend()?),
            ElementType::Null => Ok(Vec::new()),
            _ => Err(mismatch::<Self>(element, ctx)),
        }
    }
}

impl Field for current::Array {
    const SLOT: Slot = Slot::Sequence;
    const FAMILY: Option<Family> = Some(Family::Current);

    fn zero() -> Self {
        Self::new()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&self, key: &str, w: &mut DocumentWriter<'_>, _: FieldOptions) -> Result<(), EncodeError> {
        w.array(key, self)
    }

    fn from_element(element: &Element<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError> {
        coerce::<Self>(element, ctx)?;
        match element.kind {
            ElementType::Array => {
                decode::decode_items(element.as_array()?, &ctx.descend()?).map(Self::from)
            }
            ElementType::Null => Ok(Self::new()),
            _ => Err(mismatch::<Self>(element, ctx)),
        }
    }
}

/* ========================= Family-neutral scalars ========================= */

impl Field for String {
    const SLOT: Slot = Slot::String;
    const FAMILY: Option<Family> = None;

    fn zero() -> Self {
        String::new()
    }

    fn is_empty(&self) -> bool {
        String::is_empty(self)
    }

    fn write(&self, key: &str, w: &mut DocumentWriter<'_>, _: FieldOptions) -> Result<(), EncodeError> {
        w.string(key, self)
    }

    fn from_element(element: &Element<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError> {
        coerce::<Self>(element, ctx)?;
        match element.kind {
            ElementType::String => Ok(element.as_str(false)?.into_owned()),
            ElementType::Null => Ok(String::new()),
            _ => Err(mismatch::<Self>(element, ctx)),
        }
    }
}

impl Field for bool {
    const SLOT: Slot = Slot::Bool;
    const FAMILY: Option<Family> = None;

    fn zero() -> Self {
        false
    }

    fn is_empty(&self) -> bool {
        !*self
    }

    fn write(&self, key: &str, w: &mut DocumentWriter<'_>, _: FieldOptions) -> Result<(), EncodeError> {
        w.bool(key, *self)
    }

    fn from_element(element: &Element<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError> {
        coerce::<Self>(element, ctx)?;
        match element.kind {
            ElementType::Boolean => element.as_bool(),
            ElementType::Null => Ok(false),
            _ => Err(mismatch::<Self>(element, ctx)),
        }
    }
}

impl Field for i32 {
    const SLOT: Slot = Slot::Int32;
    const FAMILY: Option<Family> = None;

    fn zero() -> Self {
        0
    }

    fn is_empty(&self) -> bool {
        *self == 0
    }

    fn write(&self, key: &str, w: &mut DocumentWriter<'_>, _: FieldOptions) -> Result<(), EncodeError> {
        w.i32(key, *self)
    }

    fn from_element(element: &Element<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError> {
        coerce::<Self>(element, ctx)?;
        match element.kind {
            ElementType::Int32 => element.as_i32(),
            ElementType::Int64 => {
                let n = element.as_i64()?;
                i32::try_from(n).map_err(|_| DecodeError::IntegerOverflow {
                    key: element.key.to_string(),
                    value: n,
                })
            }
            ElementType::Double => {
                let n = integral::<Self>(element, ctx, -2_147_483_648.0, 2_147_483_648.0)?;
                Ok(n as i32)
            }
            ElementType::Null => Ok(0),
            _ => Err(mismatch::<Self>(element, ctx)),
        }
    }
}

impl Field for i64 {
    const SLOT: Slot = Slot::Int64;
    const FAMILY: Option<Family> = None;

    fn zero() -> Self {
        0
    }

    fn is_empty(&self) -> bool {
        *self == 0
    }

    fn write(
        &self,
        key: &str,
        w: &mut DocumentWriter<'_>,
        options: FieldOptions,
    ) -> Result<(), EncodeError> {
        match i32::try_from(*self) {
            Ok(small) if options.min_size => w.i32(key, small),
            _ => w.i64(key, *self),
        }
    }

    fn from_element(element: &Element<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError> {
        coerce::<Self>(element, ctx)?;
        match element.kind {
            ElementType::Int64 => element.as_i64(),
            ElementType::Int32 => Ok(i64::from(element.as_i32()?)),
            ElementType::Double => integral::<Self>(
                element,
                ctx,
                -9_223_372_036_854_775_808.0,
                9_223_372_036_854_775_808.0,
            ),
            ElementType::Null => Ok(0),
            _ => Err(mismatch::<Self>(element, ctx)),
        }
    }
}

impl Field for f64 {
    const SLOT: Slot = Slot::Double;
    const FAMILY: Option<Family> = None;

    fn zero() -> Self {
        0.0
    }

    fn is_empty(&self) -> bool {
        *self == 0.0
    }

    fn write(&self, key: &str, w: &mut DocumentWriter<'_>, _: FieldOptions) -> Result<(), EncodeError> {
        w.f64(key, *self)
    }

    fn from_element(element: &Element<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError> {
        coerce::<Self>(element, ctx)?;
        match element.kind {
            ElementType::Double => element.as_f64(),
            ElementType::Int32 => Ok(f64::from(element.as_i32()?)),
            ElementType::Int64 => Ok(element.as_i64()? as f64),
            ElementType::Null => Ok(0.0),
            _ => Err(mismatch::<Self>(element, ctx)),
        }
    }
}

/* ========================= Generic and optional ========================= */

impl Field for Value {
    const SLOT: Slot = Slot::Any;
    const FAMILY: Option<Family> = None;

    fn zero() -> Self {
        Value::Null
    }

    fn is_empty(&self) -> bool {
        Value::is_empty(self)
    }

    fn write(&self, key: &str, w: &mut DocumentWriter<'_>, _: FieldOptions) -> Result<(), EncodeError> {
        w.value(key, self)
    }

    fn from_element(element: &Element<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError> {
        decode::decode_value(element, ctx)
    }
}

/// `None` is written as null unless the field is `omitempty`; a present
/// value is never omitted. Null decodes to `None` for every inner type.
impl<T: Field> Field for Option<T> {
    const SLOT: Slot = T::SLOT;
    const FAMILY: Option<Family> = T::FAMILY;

    fn zero() -> Self {
        None
    }

    fn is_empty(&self) -> bool {
        self.is_none()
    }

    fn write(
        &self,
        key: &str,
        w: &mut DocumentWriter<'_>,
        options: FieldOptions,
    ) -> Result<(), EncodeError> {
        match self {
            Some(value) => value.write(key, w, options),
            None => w.null(key),
        }
    }

    fn from_element(element: &Element<'_>, ctx: &DecodeContext) -> Result<Self, DecodeError> {
        match element.kind {
            ElementType::Null => Ok(None),
            _ => T::from_element(element, ctx).map(Some),
        }
    }
}
