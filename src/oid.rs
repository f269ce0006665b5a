//! Object identifier constants and lookup tables.

use crate::crypto::HashAlg;

// PKIX access descriptions (RFC 5280 4.2.2.1).
pub const AUTHORITY_INFO_ACCESS: &str = "1.3.6.1.5.5.7.1.1";
pub const AD_OCSP: &str = "1.3.6.1.5.5.7.48.1";
pub const AD_CA_ISSUERS: &str = "1.3.6.1.5.5.7.48.2";
pub const SUBJECT_KEY_IDENTIFIER: &str = "2.5.29.14";

// OCSP (RFC 6960 4.2.1).
pub const ID_PKIX_OCSP_BASIC: &str = "1.3.6.1.5.5.7.48.1.1";

// CMS and timestamping (RFC 3852, RFC 3161).
pub const ID_SIGNED_DATA: &str = "1.2.840.113549.1.7.2";
pub const ID_CT_TST_INFO: &str = "1.2.840.113549.1.9.16.1.4";
pub const ID_CONTENT_TYPE: &str = "1.2.840.113549.1.9.3";
pub const ID_MESSAGE_DIGEST: &str = "1.2.840.113549.1.9.4";

// Public key algorithms.
pub const RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
pub const ID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
pub const PRIME256V1: &str = "1.2.840.10045.3.1.7";

// Digest algorithms. MD5 is named so callers can report it, but no
// digest lookup maps to it and verification treats it as unsupported.
pub const MD5: &str = "1.2.840.113549.2.5";
pub const SHA1: &str = "1.3.14.3.2.26";
pub const SHA224: &str = "2.16.840.1.101.3.4.2.4";
pub const SHA256: &str = "2.16.840.1.101.3.4.2.1";
pub const SHA384: &str = "2.16.840.1.101.3.4.2.2";
pub const SHA512: &str = "2.16.840.1.101.3.4.2.3";

// RSA PKCS#1 v1.5 signature algorithms.
pub const MD5_WITH_RSA: &str = "1.2.840.113549.1.1.4";
pub const SHA1_WITH_RSA: &str = "1.2.840.113549.1.1.5";
pub const SHA224_WITH_RSA: &str = "1.2.840.113549.1.1.14";
pub const SHA256_WITH_RSA: &str = "1.2.840.113549.1.1.11";
pub const SHA384_WITH_RSA: &str = "1.2.840.113549.1.1.12";
pub const SHA512_WITH_RSA: &str = "1.2.840.113549.1.1.13";

// ECDSA signature algorithms.
pub const ECDSA_WITH_SHA1: &str = "1.2.840.10045.4.1";
pub const ECDSA_WITH_SHA256: &str = "1.2.840.10045.4.3.2";
pub const ECDSA_WITH_SHA384: &str = "1.2.840.10045.4.3.3";
pub const ECDSA_WITH_SHA512: &str = "1.2.840.10045.4.3.4";

/// Digest algorithm named by a digest OID.
pub fn digest_algorithm(oid: &str) -> Option<HashAlg> {
    match oid {
        SHA1 => Some(HashAlg::Sha1),
        SHA224 => Some(HashAlg::Sha224),
        SHA256 => Some(HashAlg::Sha256),
        SHA384 => Some(HashAlg::Sha384),
        SHA512 => Some(HashAlg::Sha512),
        _ => None,
    }
}

/// Digest OID for a digest algorithm.
pub fn digest_oid(alg: HashAlg) -> &'static str {
    match alg {
        HashAlg::Sha1 => SHA1,
        HashAlg::Sha224 => SHA224,
        HashAlg::Sha256 => SHA256,
        HashAlg::Sha384 => SHA384,
        HashAlg::Sha512 => SHA512,
    }
}

/// Digest used by a composite signature algorithm (RSA PKCS#1 v1.5 or
/// ECDSA families).
pub fn signature_digest(oid: &str) -> Option<HashAlg> {
    match oid {
        SHA1_WITH_RSA | ECDSA_WITH_SHA1 => Some(HashAlg::Sha1),
        SHA224_WITH_RSA => Some(HashAlg::Sha224),
        SHA256_WITH_RSA | ECDSA_WITH_SHA256 => Some(HashAlg::Sha256),
        SHA384_WITH_RSA | ECDSA_WITH_SHA384 => Some(HashAlg::Sha384),
        SHA512_WITH_RSA | ECDSA_WITH_SHA512 => Some(HashAlg::Sha512),
        _ => None,
    }
}

/// Short attribute code used when rendering distinguished names,
/// e.g. `2.5.4.3` renders as `CN`.
pub fn dn_code(oid: &str) -> Option<&'static str> {
    Some(match oid {
        "2.5.4.3" => "CN",
        "2.5.4.4" => "SN",
        "2.5.4.5" => "SERIALNUMBER",
        "2.5.4.6" => "C",
        "2.5.4.7" => "L",
        "2.5.4.8" => "S",
        "2.5.4.10" => "O",
        "2.5.4.11" => "OU",
        "2.5.4.12" => "T",
        "2.5.4.42" => "G",
        "1.2.840.113549.1.9.1" => "E",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_families_map_to_digests() {
        assert_eq!(signature_digest(SHA256_WITH_RSA), Some(HashAlg::Sha256));
        assert_eq!(signature_digest(ECDSA_WITH_SHA384), Some(HashAlg::Sha384));
        assert_eq!(signature_digest(RSA_ENCRYPTION), None);
        assert_eq!(signature_digest(MD5_WITH_RSA), None);
    }

    #[test]
    fn digest_oids_round_trip() {
        for alg in [
            HashAlg::Sha1,
            HashAlg::Sha224,
            HashAlg::Sha256,
            HashAlg::Sha384,
            HashAlg::Sha512,
        ] {
            assert_eq!(digest_algorithm(digest_oid(alg)), Some(alg));
        }
    }
}
