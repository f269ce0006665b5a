//! PEM and DER certificate loading.

use {
    super::CertificateError,
    crate::asn1::{self, Element},
    base64::{engine::general_purpose::STANDARD as BASE64, Engine as _},
    std::path::Path,
};

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// Extract every certificate from a PEM bundle, in order, as DER.
pub fn certificates_from_pem(text: &str) -> Result<Vec<Vec<u8>>, CertificateError> {
    let mut certificates = Vec::new();
    let mut remaining = text;
    while let Some(start) = remaining.find(PEM_BEGIN) {
        let after_begin = &remaining[start + PEM_BEGIN.len()..];
        let end = after_begin
            .find(PEM_END)
            .ok_or_else(|| CertificateError::InvalidPem("unterminated block".into()))?;
        let body: String = after_begin[..end]
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let der = BASE64
            .decode(&body)
            .map_err(|err| CertificateError::InvalidPem(err.to_string()))?;
        certificates.push(der);
        remaining = &after_begin[end + PEM_END.len()..];
    }
    if certificates.is_empty() {
        return Err(CertificateError::MissingPem);
    }
    Ok(certificates)
}

/// Accept a certificate as either PEM or DER and return DER.
pub fn ensure_der(bytes: &[u8]) -> Result<Vec<u8>, CertificateError> {
    match std::str::from_utf8(bytes) {
        Ok(text) if text.contains(PEM_BEGIN) => {
            let mut certificates = certificates_from_pem(text)?;
            Ok(certificates.swap_remove(0))
        }
        _ => Ok(bytes.to_vec()),
    }
}

/// Decode a certificate (PEM or DER) into its element tree. The outermost
/// element must be a SEQUENCE.
pub fn certificate_from_bytes(bytes: &[u8]) -> Result<Element, CertificateError> {
    let der = ensure_der(bytes)?;
    let element = asn1::decode(&der)?;
    element
        .require_sequence()
        .map_err(|_| CertificateError::structure("certificate is not a SEQUENCE"))?;
    Ok(element)
}

/// Load a certificate from a file.
pub fn certificate_from_file(path: impl AsRef<Path>) -> Result<Element, CertificateError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| CertificateError::Io {
        path: path.display().to_string(),
        source,
    })?;
    certificate_from_bytes(&bytes)
}

/// Wrap DER as a PEM certificate block with 64-column body lines.
pub fn certificate_to_pem(der: &[u8]) -> String {
    let body = BASE64.encode(der);
    let mut pem = String::with_capacity(body.len() + 64);
    pem.push_str(PEM_BEGIN);
    pem.push('\n');
    for chunk in body.as_bytes().chunks(64) {
        pem.push_str(std::str::from_utf8(chunk).expect("base64 is ASCII"));
        pem.push('\n');
    }
    pem.push_str(PEM_END);
    pem.push('\n');
    pem
}
