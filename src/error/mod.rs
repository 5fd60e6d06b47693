//! Error handling module for bson-compat.
//!
//! The codec surfaces two narrow error kinds:
//! - [`EncodeError`] for values that cannot be written as BSON
//! - [`DecodeError`] for malformed input and coercion failures
//!
//! [`CompatError`] wraps both together with configuration and I/O failures
//! for the configuration loader and the command-line tool.
//!
//! # Example
//!
//! ```rust
//! use bson_compat::error::{CompatError, DecodeError};
//!
//! fn report(err: DecodeError) -> CompatError {
//!     err.into()
//! }
//! ```

pub mod kinds;

// Re-export commonly used types
pub use kinds::{CompatError, ConfigError, DecodeError, EncodeError, Result};
