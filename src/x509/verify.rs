//! Signature checks between certificates.

use {
    super::{
        info::{
            extract_signature_bytes, extract_subject_public_key_bytes, extract_tbs_der,
            public_key_algorithm_oid, signature_algorithm_oid,
        },
        CertificateError,
    },
    crate::{
        asn1::Element,
        crypto::{ecdsa, rsa::RsaPublicKey, CryptoError, HashAlg},
        oid,
    },
    thiserror::Error,
    tracing::debug,
};

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error(transparent)]
    Certificate(#[from] CertificateError),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("signature verification failed: {0}")]
    BadSignature(String),
}

impl From<CryptoError> for VerificationError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Unsupported(what) => Self::UnsupportedAlgorithm(what),
            other => Self::BadSignature(other.to_string()),
        }
    }
}

/// Check that `issuer`'s key signed `subject`.
///
/// The verification path is chosen by the issuer's SubjectPublicKeyInfo
/// algorithm. The EC path verifies the signature over the re-encoded TBS
/// directly; the RSA path public-decrypts the signature and compares the
/// digest recovered from the embedded DigestInfo.
pub fn validate_certificate(
    subject: &Element,
    issuer: &Element,
) -> Result<(), VerificationError> {
    let tbs = extract_tbs_der(subject)?;
    let signature = extract_signature_bytes(subject)?;
    let key_algorithm = public_key_algorithm_oid(issuer)?;
    debug!(algorithm = %key_algorithm, "validating certificate signature");
    match key_algorithm.as_str() {
        oid::ID_EC_PUBLIC_KEY => {
            let signature_algorithm = signature_algorithm_oid(subject)?;
            let hash = oid::signature_digest(signature_algorithm.as_str()).ok_or_else(|| {
                VerificationError::UnsupportedAlgorithm(signature_algorithm.to_string())
            })?;
            ecdsa::verify_p256(
                extract_subject_public_key_bytes(issuer)?,
                &tbs,
                signature,
                hash,
            )?;
        }
        oid::RSA_ENCRYPTION => {
            let key = RsaPublicKey::from_public_key_bytes(extract_subject_public_key_bytes(
                issuer,
            )?)?;
            let claimed = signature_algorithm_oid(subject)
                .ok()
                .and_then(|alg| oid::signature_digest(alg.as_str()));
            key.verify_pkcs1(&tbs, signature, claimed)?;
        }
        other => return Err(VerificationError::UnsupportedAlgorithm(other.to_owned())),
    }
    Ok(())
}

/// Verify a detached signature over `message` with the public key held in
/// `certificate`, hashing with `hash`.
pub fn verify_with_certificate(
    message: &[u8],
    signature: &[u8],
    certificate: &Element,
    hash: HashAlg,
) -> Result<(), VerificationError> {
    let key_algorithm = public_key_algorithm_oid(certificate)?;
    match key_algorithm.as_str() {
        oid::ID_EC_PUBLIC_KEY => {
            ecdsa::verify_p256(
                extract_subject_public_key_bytes(certificate)?,
                message,
                signature,
                hash,
            )?;
        }
        oid::RSA_ENCRYPTION => {
            let key = RsaPublicKey::from_public_key_bytes(extract_subject_public_key_bytes(
                certificate,
            )?)?;
            key.verify_pkcs1(message, signature, Some(hash))?;
        }
        other => return Err(VerificationError::UnsupportedAlgorithm(other.to_owned())),
    }
    Ok(())
}
