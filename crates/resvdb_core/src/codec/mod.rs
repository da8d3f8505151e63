//! Conversions between the object model and store-native values.
//!
//! # Responsibility
//! - Encode/decode dynamic attribute lists (`attr_codec`).
//! - Map fixed reservation fields to/from record bins (`resv_fields`).
//!
//! # Invariants
//! - Codecs are pure: no store access, no logging side effects on success.
//! - Encoding rejects unrepresentable input before any write is attempted.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod attr_codec;
pub mod resv_fields;

pub type CodecResult<T> = Result<T, CodecError>;

/// Conversion failure between object model and store values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Attribute name cannot form a composite key.
    InvalidAttrName(String),
    /// Resource qualifier contains characters the store key cannot carry.
    InvalidResource { name: String, resource: String },
    /// Stored attribute entry has an unexpected shape.
    MalformedAttr { key: String, reason: String },
    /// Stored bin holds a value of the wrong type.
    FieldType {
        bin: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAttrName(name) => write!(f, "attribute name `{name}` is not encodable"),
            Self::InvalidResource { name, resource } => {
                write!(f, "resource `{resource}` of attribute `{name}` is not encodable")
            }
            Self::MalformedAttr { key, reason } => {
                write!(f, "stored attribute `{key}` is malformed: {reason}")
            }
            Self::FieldType {
                bin,
                expected,
                found,
            } => write!(f, "bin `{bin}` should hold {expected}, found {found}"),
        }
    }
}

impl Error for CodecError {}
