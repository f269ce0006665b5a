//! RSA PKCS#1 v1.5 signature verification.
//!
//! Verifying only: the signature is taken through RSAVP1, the EMSA padding
//! is stripped, and the recovered DigestInfo names the digest algorithm
//! itself. Callers may pass the algorithm the signer claimed so mismatches
//! get logged.

use {
    super::{CryptoError, HashAlg},
    crate::{asn1, oid},
    num_bigint::BigUint,
    num_traits::One,
    subtle::ConstantTimeEq,
    tracing::warn,
};

#[derive(Clone, Debug)]
pub struct RsaPublicKey {
    modulus:  BigUint,
    exponent: BigUint,
}

impl RsaPublicKey {
    /// Parse the content of an SPKI public-key BIT STRING:
    /// `RSAPublicKey ::= SEQUENCE { modulus INTEGER, publicExponent INTEGER }`.
    pub fn from_public_key_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let element = asn1::decode(bytes)?;
        let fields = element
            .require_sequence()
            .map_err(|_| CryptoError::InvalidKey("RSAPublicKey is not a SEQUENCE".into()))?;
        let [modulus, exponent] = fields else {
            return Err(CryptoError::InvalidKey(
                "RSAPublicKey must hold two INTEGERs".into(),
            ));
        };
        let modulus = modulus
            .as_integer()
            .and_then(|value| value.to_biguint())
            .ok_or_else(|| CryptoError::InvalidKey("modulus is not a positive INTEGER".into()))?;
        let exponent = exponent
            .as_integer()
            .and_then(|value| value.to_biguint())
            .ok_or_else(|| CryptoError::InvalidKey("exponent is not a positive INTEGER".into()))?;
        if modulus <= BigUint::one() || exponent.is_one() {
            return Err(CryptoError::InvalidKey("degenerate RSA key".into()));
        }
        Ok(Self { modulus, exponent })
    }

    /// Modulus length in whole bytes.
    pub fn modulus_len(&self) -> usize {
        (self.modulus.bits() as usize + 7) / 8
    }

    /// RSAVP1 followed by EMSA-PKCS1-v1_5 unpadding; returns the encoded
    /// DigestInfo.
    pub fn public_decrypt(&self, signature: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let s = BigUint::from_bytes_be(signature);
        if s >= self.modulus {
            return Err(CryptoError::BadSignature(
                "signature out of range for the modulus".into(),
            ));
        }
        let em_len = self.modulus_len();
        let raw = s.modpow(&self.exponent, &self.modulus).to_bytes_be();
        if raw.len() > em_len {
            return Err(CryptoError::BadSignature("malformed encoded message".into()));
        }
        // Left-pad to the modulus width; to_bytes_be drops leading zeros.
        let mut em = vec![0u8; em_len];
        em[em_len - raw.len()..].copy_from_slice(&raw);

        if em[0] != 0x00 || em[1] != 0x01 {
            return Err(CryptoError::BadSignature("bad padding header".into()));
        }
        let separator = em[2..]
            .iter()
            .position(|&byte| byte == 0x00)
            .ok_or_else(|| CryptoError::BadSignature("padding separator missing".into()))?;
        if separator < 8 || em[2..2 + separator].iter().any(|&byte| byte != 0xFF) {
            return Err(CryptoError::BadSignature("bad padding body".into()));
        }
        Ok(em[2 + separator + 1..].to_vec())
    }

    /// Verify a PKCS#1 v1.5 signature over `message`.
    ///
    /// The digest algorithm comes from the recovered DigestInfo; when
    /// `claimed` is given and disagrees, the DigestInfo wins and the
    /// discrepancy is logged.
    pub fn verify_pkcs1(
        &self,
        message: &[u8],
        signature: &[u8],
        claimed: Option<HashAlg>,
    ) -> Result<(), CryptoError> {
        let digest_info = self.public_decrypt(signature)?;
        let element = asn1::decode(&digest_info)?;
        let fields = element
            .require_sequence()
            .map_err(|_| CryptoError::BadSignature("DigestInfo is not a SEQUENCE".into()))?;
        let [algorithm, digest] = fields else {
            return Err(CryptoError::BadSignature(
                "DigestInfo must hold an algorithm and a digest".into(),
            ));
        };
        let algorithm_oid = algorithm
            .at(0)
            .and_then(asn1::Element::as_object_identifier)
            .ok_or_else(|| CryptoError::BadSignature("missing digest algorithm".into()))?;
        let alg = oid::digest_algorithm(algorithm_oid.as_str())
            .ok_or_else(|| CryptoError::Unsupported(algorithm_oid.to_string()))?;
        if let Some(claimed) = claimed {
            if claimed != alg {
                warn!(?claimed, actual = ?alg, "signature digest differs from the claimed algorithm");
            }
        }
        let digest = digest
            .as_octet_string()
            .ok_or_else(|| CryptoError::BadSignature("digest is not an OCTET STRING".into()))?;
        let computed = alg.digest(message);
        if bool::from(computed.as_slice().ct_eq(digest)) {
            Ok(())
        } else {
            Err(CryptoError::BadSignature("digest mismatch".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::asn1::{encode, Element, ObjectIdentifier},
    };

    fn digest_info(alg: &str, digest: &[u8]) -> Vec<u8> {
        encode(&Element::sequence(vec![
            Element::sequence(vec![
                Element::object_identifier(ObjectIdentifier::new(alg).unwrap()),
                Element::null(),
            ]),
            Element::octet_string(digest.to_vec()),
        ]))
        .unwrap()
    }

    /// Exponent-one key: RSAVP1 is the identity, so padding handling can
    /// be exercised without a real key pair.
    fn identity_key(width: usize) -> RsaPublicKey {
        RsaPublicKey {
            modulus:  BigUint::from_bytes_be(&vec![0xFF; width]),
            exponent: BigUint::one(),
        }
    }

    fn pad(width: usize, payload: &[u8]) -> Vec<u8> {
        let mut em = vec![0xFF; width - payload.len()];
        em[0] = 0x00;
        em[1] = 0x01;
        em[width - payload.len() - 1] = 0x00;
        em.extend_from_slice(payload);
        em
    }

    #[test]
    fn parses_a_public_key() {
        let der = encode(&Element::sequence(vec![
            Element::integer(3233),
            Element::integer(17),
        ]))
        .unwrap();
        let key = RsaPublicKey::from_public_key_bytes(&der).unwrap();
        assert_eq!(key.modulus_len(), 2);
    }

    #[test]
    fn rejects_exponent_one_keys() {
        let der = encode(&Element::sequence(vec![
            Element::integer(3233),
            Element::integer(1),
        ]))
        .unwrap();
        assert!(RsaPublicKey::from_public_key_bytes(&der).is_err());
    }

    #[test]
    fn strips_valid_padding() {
        let key = identity_key(64);
        let info = digest_info(oid::SHA256, &[0xAB; 32]);
        let recovered = key.public_decrypt(&pad(64, &info)).unwrap();
        assert_eq!(recovered, info);
    }

    #[test]
    fn rejects_short_padding_runs() {
        let key = identity_key(64);
        // Only four 0xFF bytes before the separator.
        let mut em = vec![0x00, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];
        em.resize(64, 0xAB);
        assert!(key.public_decrypt(&em).is_err());
    }

    #[test]
    fn verifies_against_the_recovered_digest_info() {
        let key = identity_key(128);
        let message = b"content to verify";
        let info = digest_info(oid::SHA256, &HashAlg::Sha256.digest(message));
        let signature = pad(128, &info);
        key.verify_pkcs1(message, &signature, Some(HashAlg::Sha256))
            .unwrap();
        assert!(key.verify_pkcs1(b"other content", &signature, None).is_err());
    }
}
