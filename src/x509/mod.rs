//! X.509 certificate handling over the generic element tree.
//!
//! Certificates stay in their decoded [`Element`](crate::asn1::Element)
//! form; the extractor functions navigate RFC 5280 structure positionally
//! instead of materializing typed structs, so unknown extensions and
//! algorithms pass through untouched.

mod info;
mod loader;
mod verify;

pub use self::{
    info::{
        dn_string, extract_issuer, extract_issuer_certificate_url, extract_issuer_dn,
        extract_issuer_der, extract_ocsp_responder_url, extract_serial_number,
        extract_serial_number_der, extract_signature_bytes, extract_subject,
        extract_subject_der, extract_subject_dn, extract_subject_key_identifier,
        extract_subject_public_key_bytes, extract_tbs_der, extract_validity,
        public_key_algorithm_oid, signature_algorithm_oid, subject_public_key_info,
    },
    loader::{
        certificate_from_bytes, certificate_from_file, certificate_to_pem,
        certificates_from_pem, ensure_der,
    },
    verify::{validate_certificate, verify_with_certificate, VerificationError},
};

use thiserror::Error;

/// Failures while loading certificates or navigating their structure.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("no PEM certificate found")]
    MissingPem,
    #[error("invalid PEM block: {0}")]
    InvalidPem(String),
    #[error("certificate structure error: {0}")]
    Structure(String),
    #[error(transparent)]
    Asn1(#[from] crate::asn1::Asn1Error),
    #[error("failed to read {path}")]
    Io {
        path:   String,
        source: std::io::Error,
    },
}

impl CertificateError {
    pub(crate) fn structure(message: impl Into<String>) -> Self {
        Self::Structure(message.into())
    }
}
