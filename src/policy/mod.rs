//! Coercion policy shared by the encoder and the decoder
//!
//! Decoding consults [`RULES`] whenever a wire element meets a destination:
//! the row keyed by `(element type, slot, destination)` says whether the
//! value is assigned as-is, converted first, or rejected. Any combination
//! without a row is rejected.
//!
//! Encoding consults [`WIRE_TYPES`] to resolve each [`ValueKind`] to the
//! element type it is written as.
//!
//! Adding a new [`Value`](crate::Value) variant means adding a row to both
//! tables.

use std::fmt;

use crate::error::DecodeError;
use crate::value::ValueKind;

/// One of the two in-memory type families bridged by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// This crate's own identifier, regex, map and document types.
    Legacy,
    /// The `bson` crate's types and the generic containers that mirror them.
    Current,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::Legacy => write!(f, "legacy"),
            Family::Current => write!(f, "current"),
        }
    }
}

/// BSON element type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ElementType {
    Double = 0x01,
    String = 0x02,
    Document = 0x03,
    Array = 0x04,
    Binary = 0x05,
    Undefined = 0x06,
    ObjectId = 0x07,
    Boolean = 0x08,
    DateTime = 0x09,
    Null = 0x0A,
    Regex = 0x0B,
    DbPointer = 0x0C,
    JavaScript = 0x0D,
    Symbol = 0x0E,
    JavaScriptWithScope = 0x0F,
    Int32 = 0x10,
    Timestamp = 0x11,
    Int64 = 0x12,
    Decimal128 = 0x13,
    MaxKey = 0x7F,
    MinKey = 0xFF,
}

impl ElementType {
    pub const ALL: [ElementType; 21] = [
        ElementType::Double,
        ElementType::String,
        ElementType::Document,
        ElementType::Array,
        ElementType::Binary,
        ElementType::Undefined,
        ElementType::ObjectId,
        ElementType::Boolean,
        ElementType::DateTime,
        ElementType::Null,
        ElementType::Regex,
        ElementType::DbPointer,
        ElementType::JavaScript,
        ElementType::Symbol,
        ElementType::JavaScriptWithScope,
        ElementType::Int32,
        ElementType::Timestamp,
        ElementType::Int64,
        ElementType::Decimal128,
        ElementType::MaxKey,
        ElementType::MinKey,
    ];

    /// Resolve a wire tag, returning `None` for tags outside the BSON grammar.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.tag() == tag)
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::Double => "double",
            ElementType::String => "string",
            ElementType::Document => "embedded document",
            ElementType::Array => "array",
            ElementType::Binary => "binary",
            ElementType::ObjectId => "objectId",
            ElementType::Boolean => "bool",
            ElementType::DateTime => "UTC datetime",
            ElementType::Null => "null",
            ElementType::Regex => "regex",
            ElementType::Int32 => "int32",
            ElementType::Int64 => "int64",
            ElementType::Undefined => "undefined",
            ElementType::DbPointer => "DBPointer",
            ElementType::JavaScript => "javascript",
            ElementType::Symbol => "symbol",
            ElementType::JavaScriptWithScope => "javascript with scope",
            ElementType::Timestamp => "timestamp",
            ElementType::Decimal128 => "decimal128",
            ElementType::MaxKey => "max key",
            ElementType::MinKey => "min key",
        };
        f.write_str(name)
    }
}

/// The shape a destination slot declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Identifier,
    Regex,
    Time,
    Binary,
    OrderedDocument,
    UnorderedDocument,
    Sequence,
    String,
    Bool,
    Int32,
    Int64,
    Double,
    /// Family-agnostic slot, filled by the generic decoder.
    Any,
}

impl Slot {
    pub const ALL: [Slot; 13] = [
        Slot::Identifier,
        Slot::Regex,
        Slot::Time,
        Slot::Binary,
        Slot::OrderedDocument,
        Slot::UnorderedDocument,
        Slot::Sequence,
        Slot::String,
        Slot::Bool,
        Slot::Int32,
        Slot::Int64,
        Slot::Double,
        Slot::Any,
    ];
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Slot::Identifier => "identifier",
            Slot::Regex => "regex",
            Slot::Time => "time",
            Slot::Binary => "binary",
            Slot::OrderedDocument => "ordered document",
            Slot::UnorderedDocument => "unordered document",
            Slot::Sequence => "sequence",
            Slot::String => "string",
            Slot::Bool => "bool",
            Slot::Int32 => "int32",
            Slot::Int64 => "int64",
            Slot::Double => "double",
            Slot::Any => "any",
        };
        f.write_str(name)
    }
}

/// The destination kind a wire value is decoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    StructuralLegacy,
    StructuralCurrent,
    GenericLegacy,
    GenericCurrent,
}

impl Destination {
    pub const ALL: [Destination; 4] = [
        Destination::StructuralLegacy,
        Destination::StructuralCurrent,
        Destination::GenericLegacy,
        Destination::GenericCurrent,
    ];

    pub fn structural(family: Family) -> Self {
        match family {
            Family::Legacy => Destination::StructuralLegacy,
            Family::Current => Destination::StructuralCurrent,
        }
    }

    pub fn generic(family: Family) -> Self {
        match family {
            Family::Legacy => Destination::GenericLegacy,
            Family::Current => Destination::GenericCurrent,
        }
    }

    pub fn family(self) -> Family {
        match self {
            Destination::StructuralLegacy | Destination::GenericLegacy => Family::Legacy,
            Destination::StructuralCurrent | Destination::GenericCurrent => Family::Current,
        }
    }

    pub fn is_generic(self) -> bool {
        matches!(
            self,
            Destination::GenericLegacy | Destination::GenericCurrent
        )
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_generic() { "generic" } else { "structural" };
        write!(f, "{kind} {}", self.family())
    }
}

/// Outcome of a policy lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// The wire value is stored as-is.
    Assign,
    /// The wire value is converted (possibly fallibly) before it is stored.
    Convert,
    /// The combination is a type mismatch.
    Fail,
}

/// A single row of the coercion table.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub wire: ElementType,
    pub slot: Slot,
    pub destinations: &'static [Destination],
    pub action: Coercion,
}

const STRUCTURAL: &[Destination] = &[Destination::StructuralLegacy, Destination::StructuralCurrent];
const STRUCTURAL_LEGACY: &[Destination] = &[Destination::StructuralLegacy];
const STRUCTURAL_CURRENT: &[Destination] = &[Destination::StructuralCurrent];
const GENERIC: &[Destination] = &[Destination::GenericLegacy, Destination::GenericCurrent];
const GENERIC_LEGACY: &[Destination] = &[Destination::GenericLegacy];
const GENERIC_CURRENT: &[Destination] = &[Destination::GenericCurrent];

const fn rule(
    wire: ElementType,
    slot: Slot,
    destinations: &'static [Destination],
    action: Coercion,
) -> Rule {
    Rule {
        wire,
        slot,
        destinations,
        action,
    }
}

use Coercion::{Assign, Convert, Fail};
use ElementType as E;

/// The decode-side coercion table.
pub static RULES: &[Rule] = &[
    // Identifiers: raw bytes, hex text, and null (legacy only).
    rule(E::ObjectId, Slot::Identifier, STRUCTURAL, Assign),
    rule(E::String, Slot::Identifier, STRUCTURAL, Convert),
    rule(E::Null, Slot::Identifier, STRUCTURAL_LEGACY, Convert),
    rule(E::Null, Slot::Identifier, STRUCTURAL_CURRENT, Fail),
    // Regular expressions
    rule(E::Regex, Slot::Regex, STRUCTURAL, Assign),
    rule(E::Null, Slot::Regex, STRUCTURAL_LEGACY, Convert),
    rule(E::Null, Slot::Regex, STRUCTURAL_CURRENT, Fail),
    // Times: native time converts from milliseconds, bson::DateTime is stored as-is.
    rule(E::DateTime, Slot::Time, STRUCTURAL_LEGACY, Convert),
    rule(E::DateTime, Slot::Time, STRUCTURAL_CURRENT, Assign),
    rule(E::Null, Slot::Time, STRUCTURAL_LEGACY, Convert),
    rule(E::Null, Slot::Time, STRUCTURAL_CURRENT, Fail),
    // Binary
    rule(E::Binary, Slot::Binary, STRUCTURAL, Assign),
    rule(E::Null, Slot::Binary, STRUCTURAL_LEGACY, Convert),
    rule(E::Null, Slot::Binary, STRUCTURAL_CURRENT, Fail),
    // Documents and sequences; null yields an empty container.
    rule(E::Document, Slot::OrderedDocument, STRUCTURAL, Assign),
    rule(E::Document, Slot::UnorderedDocument, STRUCTURAL, Assign),
    rule(E::Array, Slot::Sequence, STRUCTURAL, Assign),
    rule(E::Null, Slot::OrderedDocument, STRUCTURAL, Convert),
    rule(E::Null, Slot::UnorderedDocument, STRUCTURAL, Convert),
    rule(E::Null, Slot::Sequence, STRUCTURAL, Convert),
    // Family-neutral scalars; null yields the zero value.
    rule(E::String, Slot::String, STRUCTURAL, Assign),
    rule(E::Null, Slot::String, STRUCTURAL, Convert),
    rule(E::Boolean, Slot::Bool, STRUCTURAL, Assign),
    rule(E::Null, Slot::Bool, STRUCTURAL, Convert),
    rule(E::Int32, Slot::Int32, STRUCTURAL, Assign),
    rule(E::Int64, Slot::Int32, STRUCTURAL, Convert),
    rule(E::Double, Slot::Int32, STRUCTURAL, Convert),
    rule(E::Null, Slot::Int32, STRUCTURAL, Convert),
    rule(E::Int64, Slot::Int64, STRUCTURAL, Assign),
    rule(E::Int32, Slot::Int64, STRUCTURAL, Convert),
    rule(E::Double, Slot::Int64, STRUCTURAL, Convert),
    rule(E::Null, Slot::Int64, STRUCTURAL, Convert),
    rule(E::Double, Slot::Double, STRUCTURAL, Assign),
    rule(E::Int32, Slot::Double, STRUCTURAL, Convert),
    rule(E::Int64, Slot::Double, STRUCTURAL, Convert),
    rule(E::Null, Slot::Double, STRUCTURAL, Convert),
    // Generic destinations accept every element except the deprecated DBPointer.
    rule(E::Double, Slot::Any, GENERIC, Assign),
    rule(E::String, Slot::Any, GENERIC, Assign),
    rule(E::Document, Slot::Any, GENERIC, Assign),
    rule(E::Array, Slot::Any, GENERIC, Assign),
    rule(E::Binary, Slot::Any, GENERIC, Assign),
    rule(E::ObjectId, Slot::Any, GENERIC, Assign),
    rule(E::Boolean, Slot::Any, GENERIC, Assign),
    rule(E::Null, Slot::Any, GENERIC, Assign),
    rule(E::Regex, Slot::Any, GENERIC, Assign),
    rule(E::Int64, Slot::Any, GENERIC, Assign),
    // No native type in either family; both decode to the reference crate's types.
    rule(E::Undefined, Slot::Any, GENERIC, Assign),
    rule(E::JavaScript, Slot::Any, GENERIC, Assign),
    rule(E::Symbol, Slot::Any, GENERIC, Assign),
    rule(E::JavaScriptWithScope, Slot::Any, GENERIC, Assign),
    rule(E::Timestamp, Slot::Any, GENERIC, Assign),
    rule(E::Decimal128, Slot::Any, GENERIC, Assign),
    rule(E::MinKey, Slot::Any, GENERIC, Assign),
    rule(E::MaxKey, Slot::Any, GENERIC, Assign),
    // The legacy generic decoder yields native time and native ints.
    rule(E::DateTime, Slot::Any, GENERIC_LEGACY, Convert),
    rule(E::DateTime, Slot::Any, GENERIC_CURRENT, Assign),
    rule(E::Int32, Slot::Any, GENERIC_LEGACY, Convert),
    rule(E::Int32, Slot::Any, GENERIC_CURRENT, Assign),
];

/// The encode-side resolution of value kinds to element types.
///
/// `Int` is listed as Int32; the encoder widens it to Int64 when the value
/// does not fit in 32 bits.
pub static WIRE_TYPES: &[(ValueKind, ElementType)] = &[
    (ValueKind::Null, E::Null),
    (ValueKind::Bool, E::Boolean),
    (ValueKind::Int, E::Int32),
    (ValueKind::Int32, E::Int32),
    (ValueKind::Int64, E::Int64),
    (ValueKind::Double, E::Double),
    (ValueKind::String, E::String),
    (ValueKind::ObjectId, E::ObjectId),
    (ValueKind::RegEx, E::Regex),
    (ValueKind::Time, E::DateTime),
    (ValueKind::Binary, E::Binary),
    (ValueKind::M, E::Document),
    (ValueKind::D, E::Document),
    (ValueKind::Slice, E::Array),
    (ValueKind::Oid, E::ObjectId),
    (ValueKind::Regex, E::Regex),
    (ValueKind::DateTime, E::DateTime),
    (ValueKind::BsonBinary, E::Binary),
    (ValueKind::Map, E::Document),
    (ValueKind::Document, E::Document),
    (ValueKind::Array, E::Array),
    (ValueKind::Undefined, E::Undefined),
    (ValueKind::JavaScript, E::JavaScript),
    (ValueKind::Symbol, E::Symbol),
    (ValueKind::JavaScriptWithScope, E::JavaScriptWithScope),
    (ValueKind::Timestamp, E::Timestamp),
    (ValueKind::Decimal128, E::Decimal128),
    (ValueKind::MinKey, E::MinKey),
    (ValueKind::MaxKey, E::MaxKey),
];

/// Look up the coercion for a wire element meeting a destination slot.
pub fn resolve(wire: ElementType, slot: Slot, destination: Destination) -> Coercion {
    RULES
        .iter()
        .find(|r| r.wire == wire && r.slot == slot && r.destinations.contains(&destination))
        .map(|r| r.action)
        .unwrap_or(Fail)
}

/// Like [`resolve`], turning `Fail` into a [`DecodeError::TypeMismatch`].
pub fn check(
    key: &str,
    wire: ElementType,
    slot: Slot,
    destination: Destination,
) -> Result<Coercion, DecodeError> {
    match resolve(wire, slot, destination) {
        Fail => Err(DecodeError::TypeMismatch {
            key: key.to_string(),
            wire,
            slot,
            destination,
        }),
        action => Ok(action),
    }
}

/// Element type a value kind is written as.
pub fn wire_type(kind: ValueKind) -> ElementType {
    WIRE_TYPES
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, t)| *t)
        .unwrap_or(E::Null)
}
