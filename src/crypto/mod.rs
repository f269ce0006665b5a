//! Digest and signature-verification primitives.
//!
//! Verification only. Nothing in this crate creates signatures; the test
//! suites carry their own signing helpers.

pub mod ecdsa;
pub mod rsa;

use {
    sha1::Sha1,
    sha2::{Digest, Sha224, Sha256, Sha384, Sha512},
    thiserror::Error,
};

/// Failures from the verification primitives.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("unsupported algorithm: {0}")]
    Unsupported(String),
    #[error("invalid public key: {0}")]
    InvalidKey(String),
    #[error("signature verification failed: {0}")]
    BadSignature(String),
    #[error(transparent)]
    Asn1(#[from] crate::asn1::Asn1Error),
}

/// The digest algorithms understood across certificates, OCSP and
/// timestamp tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashAlg {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlg {
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => Sha1::digest(data).to_vec(),
            Self::Sha224 => Sha224::digest(data).to_vec(),
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    pub fn digest_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Lookup by lowercase name, e.g. `"sha256"`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sha1" => Some(Self::Sha1),
            "sha224" => Some(Self::Sha224),
            "sha256" => Some(Self::Sha256),
            "sha384" => Some(Self::Sha384),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, hex_literal::hex};

    #[test]
    fn digests_match_known_vectors() {
        assert_eq!(
            HashAlg::Sha256.digest(b"abc"),
            hex!("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        assert_eq!(
            HashAlg::Sha1.digest(b"abc"),
            hex!("a9993e364706816aba3e25717850c26c9cd0d89d")
        );
    }

    #[test]
    fn digest_lengths() {
        for alg in [
            HashAlg::Sha1,
            HashAlg::Sha224,
            HashAlg::Sha256,
            HashAlg::Sha384,
            HashAlg::Sha512,
        ] {
            assert_eq!(alg.digest(b"x").len(), alg.digest_len());
        }
    }
}
