//! BSON compatibility codec
//!
//! Encodes and decodes BSON for two in-memory type families: a *legacy*
//! family (`legacy::ObjectId`, `legacy::M`, `legacy::D`, native time) and a
//! *current* family built on the `bson` crate's types. Either family can
//! read what the other wrote, byte for byte, and values of both families
//! can be mixed inside one document.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `codec`: Shared decode driver and the `Unmarshal` trait
//! - `config`: Configuration management
//! - `current`: Current-family containers and entry point
//! - `decode`: Wire reader and generic value decoding
//! - `encode`: Document writer and the `Marshal` trait
//! - `error`: Error types and handling
//! - `field`: Typed fields of structural documents
//! - `legacy`: Legacy-family types and entry point
//! - `policy`: Wire types, slots and the coercion table
//! - `value`: The generic value shared by both families
//!
//! # Example
//!
//! ```
//! use bson_compat::{current, legacy, Value};
//!
//! let mut doc = legacy::M::new();
//! doc.insert("n".to_string(), Value::Int(1));
//! let bytes = legacy::marshal(&doc).unwrap();
//!
//! let mut decoded = current::Document::new();
//! current::unmarshal(&bytes, &mut decoded).unwrap();
//! assert_eq!(decoded.get("n"), Some(&Value::Int32(1)));
//! ```

mod macros;

pub mod cli;
pub mod codec;
pub mod config;
pub mod current;
pub mod decode;
pub mod encode;
pub mod error;
pub mod field;
pub mod legacy;
pub mod policy;
pub mod value;

// Re-export commonly used types
pub use codec::{Codec, Unmarshal};
pub use config::CodecConfig;
pub use encode::{Marshal, marshal};
pub use error::{CompatError, DecodeError, EncodeError, Result};
pub use policy::Family;
pub use value::{Value, ValueKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}
