//! ECDSA signature verification over P-256.

use {
    super::{CryptoError, HashAlg},
    p256::ecdsa::{signature::hazmat::PrehashVerifier, Signature, VerifyingKey},
};

/// Verify a DER-encoded ECDSA signature over `message`.
///
/// `public_key` is the uncompressed or compressed SEC1 point from the
/// certificate's SPKI BIT STRING.
pub fn verify_p256(
    public_key: &[u8],
    message: &[u8],
    signature_der: &[u8],
    hash: HashAlg,
) -> Result<(), CryptoError> {
    let key = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|err| CryptoError::InvalidKey(err.to_string()))?;
    let signature = Signature::from_der(signature_der)
        .map_err(|err| CryptoError::BadSignature(err.to_string()))?;
    let digest = hash.digest(message);
    key.verify_prehash(&digest, &signature)
        .map_err(|err| CryptoError::BadSignature(err.to_string()))
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        p256::ecdsa::{signature::hazmat::PrehashSigner, SigningKey},
    };

    #[test]
    fn verifies_its_own_signatures() {
        let signer = SigningKey::random(&mut rand::thread_rng());
        let message = b"timestamped content";
        let digest = HashAlg::Sha256.digest(message);
        let signature: Signature = signer.sign_prehash(&digest).unwrap();
        let der = signature.to_der();

        let point = signer.verifying_key().to_encoded_point(false);
        verify_p256(point.as_bytes(), message, der.as_bytes(), HashAlg::Sha256).unwrap();

        let mut flipped = der.as_bytes().to_vec();
        *flipped.last_mut().unwrap() ^= 0x01;
        assert!(verify_p256(point.as_bytes(), message, &flipped, HashAlg::Sha256).is_err());
    }
}
