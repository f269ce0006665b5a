//! OBJECT IDENTIFIER value type.

use {
    super::error::Asn1Error,
    num_bigint::BigUint,
    num_traits::Zero,
    std::{fmt, str::FromStr},
};

/// An OBJECT IDENTIFIER held in dotted-decimal form.
///
/// The string form always matches `\d+\.\d+(\.\d+)*`; construction rejects
/// anything else, so a held value can be compared against OID constants
/// without re-validation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectIdentifier(String);

impl ObjectIdentifier {
    /// Create from a dotted-decimal string.
    pub fn new(identifier: impl Into<String>) -> Result<Self, Asn1Error> {
        let identifier = identifier.into();
        let mut arcs = 0usize;
        for arc in identifier.split('.') {
            if arc.is_empty() || !arc.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Asn1Error::invalid("invalid object identifier"));
            }
            arcs += 1;
        }
        if arcs < 2 {
            return Err(Asn1Error::invalid("invalid object identifier"));
        }
        Ok(Self(identifier))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the DER content octets: base-128 arcs with the first two
    /// packed as `40 * X + Y`.
    pub(crate) fn from_der_value(bytes: &[u8]) -> Result<Self, Asn1Error> {
        if bytes.is_empty() {
            return Err(Asn1Error::decoding("empty object identifier"));
        }
        let mut arcs: Vec<BigUint> = Vec::new();
        let mut current = BigUint::zero();
        let mut in_arc = false;
        for (index, &byte) in bytes.iter().enumerate() {
            if !in_arc && byte == 0x80 {
                return Err(Asn1Error::decoding("non-minimal object identifier arc"));
            }
            in_arc = true;
            current = (current << 7) | BigUint::from(byte & 0x7F);
            if byte & 0x80 == 0 {
                if arcs.is_empty() {
                    // First value packs the two leading arcs.
                    let forty = BigUint::from(40u32);
                    let eighty = BigUint::from(80u32);
                    if current < forty {
                        arcs.push(BigUint::zero());
                        arcs.push(current.clone());
                    } else if current < eighty {
                        arcs.push(BigUint::from(1u32));
                        arcs.push(&current - forty);
                    } else {
                        arcs.push(BigUint::from(2u32));
                        arcs.push(&current - eighty);
                    }
                } else {
                    arcs.push(current.clone());
                }
                current = BigUint::zero();
                in_arc = false;
            } else if index + 1 == bytes.len() {
                return Err(Asn1Error::decoding("truncated object identifier arc"));
            }
        }
        let identifier = arcs
            .iter()
            .map(|arc| arc.to_string())
            .collect::<Vec<_>>()
            .join(".");
        Self::new(identifier)
    }

    /// Encode to DER content octets.
    pub(crate) fn to_der_value(&self) -> Result<Vec<u8>, Asn1Error> {
        let arcs: Vec<BigUint> = self
            .0
            .split('.')
            .map(|arc| BigUint::from_str(arc))
            .collect::<Result<_, _>>()
            .map_err(|_| Asn1Error::encoding("invalid object identifier"))?;
        if arcs.len() < 2 || arcs[0] > BigUint::from(2u32) {
            return Err(Asn1Error::encoding("invalid object identifier"));
        }
        let mut out = Vec::new();
        let first = &arcs[0] * 40u32 + &arcs[1];
        encode_base128(&mut out, &first);
        for arc in &arcs[2..] {
            encode_base128(&mut out, arc);
        }
        Ok(out)
    }
}

/// Append one arc as big-endian base-128 with continuation bits.
pub(crate) fn encode_base128(out: &mut Vec<u8>, value: &BigUint) {
    if value.is_zero() {
        out.push(0);
        return;
    }
    let mut groups = Vec::new();
    let mut remaining = value.clone();
    let mask = BigUint::from(0x7Fu32);
    while !remaining.is_zero() {
        let group = (&remaining & &mask).to_u32_digits().first().copied().unwrap_or(0) as u8;
        groups.push(group);
        remaining >>= 7;
    }
    for (index, group) in groups.iter().rev().enumerate() {
        if index + 1 == groups.len() {
            out.push(*group);
        } else {
            out.push(group | 0x80);
        }
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectIdentifier {
    type Err = Asn1Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl PartialEq<str> for ObjectIdentifier {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ObjectIdentifier {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_identifiers() {
        let oid = ObjectIdentifier::new("1.3.6.1.5.5.7.48.1").unwrap();
        assert_eq!(oid.as_str(), "1.3.6.1.5.5.7.48.1");
    }

    #[test]
    fn rejects_empty_arcs() {
        assert!(ObjectIdentifier::new("1.3.6.1.5.5..1").is_err());
        assert!(ObjectIdentifier::new(".1.2").is_err());
        assert!(ObjectIdentifier::new("1.").is_err());
    }

    #[test]
    fn rejects_single_arc_and_garbage() {
        assert!(ObjectIdentifier::new("1").is_err());
        assert!(ObjectIdentifier::new("1.a.3").is_err());
        assert!(ObjectIdentifier::new("").is_err());
    }

    #[test]
    fn der_round_trip() {
        // sha256WithRSAEncryption
        let oid = ObjectIdentifier::new("1.2.840.113549.1.1.11").unwrap();
        let der = oid.to_der_value().unwrap();
        assert_eq!(der, [0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0B]);
        assert_eq!(ObjectIdentifier::from_der_value(&der).unwrap(), oid);
    }

    #[test]
    fn decodes_two_arc_identifiers() {
        // joint-iso-itu-t ds (2.5)
        let oid = ObjectIdentifier::from_der_value(&[0x55]).unwrap();
        assert_eq!(oid.as_str(), "2.5");
    }

    #[test]
    fn rejects_truncated_arc() {
        assert!(ObjectIdentifier::from_der_value(&[0x2A, 0x86]).is_err());
    }
}
