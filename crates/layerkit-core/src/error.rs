//! Error handling for LayerKit
//!
//! Provides error types for the layers of the toolpath pipeline:
//! - Decode errors (binary container structure, compression, encoding)
//! - Modification errors (user input validated before any edit is queued)
//! - Insert errors (insert dimensions and the pause they produce)
//!
//! Integrity problems that do not stop decoding (checksum mismatches, truncated
//! heatshrink streams) are logged rather than returned. Advisory outcomes such as
//! "no layers detected" are modelled as values, not errors.
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Container decode error type
///
/// Every variant is fatal: decoding aborts and no partial text is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// File does not start with the container magic
    #[error("Not a valid binary G-code container (bad magic)")]
    InvalidMagic,

    /// A header or payload extends past the end of the buffer
    #[error("Container truncated at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        /// Byte offset where the read started.
        offset: usize,
        /// Number of bytes required.
        needed: usize,
        /// Number of bytes left in the buffer.
        available: usize,
    },

    /// Block declares a compression id this decoder does not know
    #[error("Unknown compression type {id}")]
    UnknownCompression {
        /// The compression id read from the block header.
        id: u16,
    },

    /// Block declares an encoding id this decoder does not know
    #[error("Unknown encoding type {id}")]
    UnknownEncoding {
        /// The encoding id read from the block header.
        id: u16,
    },

    /// Raw deflate stream could not be inflated
    #[error("Deflate decompression failed: {message}")]
    Inflate {
        /// The underlying inflate error message.
        message: String,
    },

    /// Decoded payload is not valid UTF-8
    #[error("Decoded G-code is not valid UTF-8: {message}")]
    InvalidUtf8 {
        /// The underlying conversion error message.
        message: String,
    },
}

/// Modification validation error type
///
/// Raised before the modification list is touched, so a failed call never
/// leaves a partial edit behind.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModificationError {
    /// The toolpath has no layers to attach edits to
    #[error("No layers detected; file is not recognized as a sliced toolpath")]
    NoLayers,

    /// Target layer does not exist in the parsed toolpath
    #[error("Layer {layer} not found")]
    LayerNotFound {
        /// The requested layer number.
        layer: u32,
    },

    /// Z-offset of exactly zero
    #[error("Z-offset must be non-zero")]
    ZeroOffset,

    /// A numeric field is NaN or infinite
    #[error("{field} must be a finite number")]
    NotFinite {
        /// The offending field name.
        field: &'static str,
    },

    /// A numeric field that must be positive is zero or negative
    #[error("{field} must be greater than zero (got {value})")]
    NotPositive {
        /// The offending field name.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// A numeric field that must not be negative is negative
    #[error("{field} must not be negative (got {value})")]
    Negative {
        /// The offending field name.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// Layer range with end before start
    #[error("End layer {end} is before start layer {start}")]
    EndBeforeStart {
        /// The range start layer.
        start: u32,
        /// The range end layer.
        end: u32,
    },

    /// A text field that must carry content is blank
    #[error("{field} must not be empty")]
    Empty {
        /// The offending field name.
        field: &'static str,
    },

    /// Filament slot outside the addressable range
    #[error("Filament slot {slot} out of range (0-{max})")]
    SlotOutOfRange {
        /// The requested slot.
        slot: u32,
        /// The highest valid slot.
        max: u32,
    },

    /// No modification with this id is queued
    #[error("Modification {id} not found")]
    NotFound {
        /// The missing modification id.
        id: String,
    },
}

/// Insert planning error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InsertError {
    /// Insert dimension is zero, negative, or not finite
    #[error("Insert {field} must be a positive number (got {value})")]
    InvalidDimension {
        /// The offending dimension name.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// The pause that places the insert was rejected
    #[error(transparent)]
    Modification(#[from] ModificationError),
}

/// Unified error type
///
/// Combines all LayerKit error types into a single type for convenient error handling.
#[derive(Error, Debug)]
pub enum Error {
    /// Container decode error
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Modification validation error
    #[error(transparent)]
    Modification(#[from] ModificationError),

    /// Insert planning error
    #[error(transparent)]
    Insert(#[from] InsertError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a decode error
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Error::Decode(_))
    }

    /// Check if this is a validation error
    pub fn is_modification_error(&self) -> bool {
        matches!(self, Error::Modification(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
