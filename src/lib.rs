//! ASN.1 BER/DER codec with OCSP (RFC 6960) and RFC 3161 timestamp
//! verification.
//!
//! The crate decodes DER into a closed element tree ([`asn1::Element`]),
//! navigates X.509 certificates positionally over that tree, and builds on
//! both to offer OCSP revocation checking ([`ocsp::Ocsp`]) and timestamp
//! request/validation ([`tsa::Tsa`]). HTTP is abstracted behind
//! [`transport::Transport`] so callers plug in their own client.

pub mod asn1;
pub mod crypto;
pub mod ocsp;
pub mod oid;
pub mod transport;
pub mod tsa;
pub mod x509;

pub use self::{
    asn1::{Asn1Error, Element},
    ocsp::{Ocsp, OcspError},
    transport::{Transport, TransportError},
    tsa::{Tsa, TsaError},
};
