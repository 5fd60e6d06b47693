use std::{fmt, io};

use crate::policy::{Destination, ElementType, Slot};

/// Crate-wide `Result` type using [`CompatError`] as the error.
///
/// The codec entry points return the narrower [`EncodeError`] and
/// [`DecodeError`]; this alias is used by configuration loading and the CLI.
pub type Result<T> = std::result::Result<T, CompatError>;

/// Top-level error type for bson-compat operations.
#[derive(Debug)]
pub enum CompatError {
    /// Encoding errors.
    Encode(EncodeError),

    /// Decoding errors.
    Decode(DecodeError),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors.
    Io(io::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Errors raised while producing BSON bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The value has no BSON mapping at this position.
    Unsupported(String),

    /// A legacy identifier that does not hold exactly 12 bytes was written.
    InvalidObjectId { len: usize },

    /// A key or cstring payload contains a NUL byte.
    InteriorNul(String),

    /// A length prefix would not fit in a signed 32-bit integer.
    DocumentTooLarge(usize),
}

/// Errors raised while parsing BSON bytes into a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer ended before the element or document was complete.
    Truncated { needed: usize, remaining: usize },

    /// A length prefix or terminator is inconsistent.
    Malformed(String),

    /// A key or string payload is not valid UTF-8.
    InvalidUtf8 { key: String },

    /// The element type tag is not handled by either family.
    UnsupportedElement { key: String, tag: u8 },

    /// The coercion policy rejects this wire type for the destination.
    TypeMismatch {
        key: String,
        wire: ElementType,
        slot: Slot,
        destination: Destination,
    },

    /// A string could not be read as a 24-character hex identifier.
    InvalidObjectIdHex(String),

    /// An integer does not fit the destination width.
    IntegerOverflow { key: String, value: i64 },

    /// A UTC datetime is outside the range of the native time type.
    DateTimeOutOfRange(i64),

    /// Documents are nested deeper than the configured limit.
    DepthExceeded(usize),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for CompatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompatError::Encode(e) => write!(f, "Encode error: {e}"),
            CompatError::Decode(e) => write!(f, "Decode error: {e}"),
            CompatError::Config(e) => write!(f, "Configuration error: {e}"),
            CompatError::Io(e) => write!(f, "I/O error: {e}"),
            CompatError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::Unsupported(what) => write!(f, "Unsupported value: {what}"),
            EncodeError::InvalidObjectId { len } => {
                write!(f, "ObjectIds must be exactly 12 bytes long (got {len})")
            }
            EncodeError::InteriorNul(s) => write!(f, "Unexpected NUL byte in '{s}'"),
            EncodeError::DocumentTooLarge(len) => {
                write!(f, "Document of {len} bytes exceeds the BSON size limit")
            }
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Truncated { needed, remaining } => {
                write!(f, "Unexpected end of input: needed {needed} bytes, {remaining} left")
            }
            DecodeError::Malformed(msg) => write!(f, "Malformed document: {msg}"),
            DecodeError::InvalidUtf8 { key } => write!(f, "Invalid UTF-8 in field '{key}'"),
            DecodeError::UnsupportedElement { key, tag } => {
                write!(f, "Unsupported element type 0x{tag:02x} in field '{key}'")
            }
            DecodeError::TypeMismatch {
                key,
                wire,
                slot,
                destination,
            } => write!(
                f,
                "Cannot decode {wire} into {slot} ({destination}) for field '{key}'"
            ),
            DecodeError::InvalidObjectIdHex(s) => write!(f, "Invalid ObjectId hex: {s:?}"),
            DecodeError::IntegerOverflow { key, value } => {
                write!(f, "Integer {value} overflows the target of field '{key}'")
            }
            DecodeError::DateTimeOutOfRange(ms) => {
                write!(f, "Datetime {ms}ms is outside the supported range")
            }
            DecodeError::DepthExceeded(depth) => {
                write!(f, "Document nesting exceeds the limit of {depth}")
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for CompatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompatError::Encode(e) => Some(e),
            CompatError::Decode(e) => Some(e),
            CompatError::Config(e) => Some(e),
            CompatError::Io(e) => Some(e),
            CompatError::Generic(_) => None,
        }
    }
}
impl std::error::Error for EncodeError {}
impl std::error::Error for DecodeError {}
impl std::error::Error for ConfigError {}

/* ========================= Conversions to CompatError ========================= */

impl From<io::Error> for CompatError {
    fn from(err: io::Error) -> Self {
        CompatError::Io(err)
    }
}

impl From<EncodeError> for CompatError {
    fn from(err: EncodeError) -> Self {
        CompatError::Encode(err)
    }
}

impl From<DecodeError> for CompatError {
    fn from(err: DecodeError) -> Self {
        CompatError::Decode(err)
    }
}

impl From<ConfigError> for CompatError {
    fn from(err: ConfigError) -> Self {
        CompatError::Config(err)
    }
}

impl From<String> for CompatError {
    fn from(msg: String) -> Self {
        CompatError::Generic(msg)
    }
}

impl From<&str> for CompatError {
    fn from(msg: &str) -> Self {
        CompatError::Generic(msg.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_error_display() {
        let err = EncodeError::InvalidObjectId { len: 0 };
        assert_eq!(
            err.to_string(),
            "ObjectIds must be exactly 12 bytes long (got 0)"
        );
    }

    #[test]
    fn test_decode_error_wraps_into_compat_error() {
        let err: CompatError = DecodeError::DepthExceeded(4).into();
        assert_eq!(
            err.to_string(),
            "Decode error: Document nesting exceeds the limit of 4"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = DecodeError::TypeMismatch {
            key: "_id".to_string(),
            wire: ElementType::Null,
            slot: Slot::Identifier,
            destination: Destination::StructuralCurrent,
        };
        let text = err.to_string();
        assert!(text.contains("null"));
        assert!(text.contains("_id"));
    }
}
