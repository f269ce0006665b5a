//! Error type for the ASN.1 layer.

use thiserror::Error;

/// Failures raised while decoding, encoding or constructing elements.
///
/// A decoding failure is always fatal to the current decode: no partial
/// tree is ever handed back to the caller.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Asn1Error {
    #[error("ASN.1 decoding failed: {0}")]
    Decoding(String),
    #[error("ASN.1 encoding failed: {0}")]
    Encoding(String),
    #[error("invalid ASN.1 value: {0}")]
    InvalidValue(String),
}

impl Asn1Error {
    pub(crate) fn decoding(message: impl Into<String>) -> Self {
        Self::Decoding(message.into())
    }

    pub(crate) fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding(message.into())
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidValue(message.into())
    }
}
