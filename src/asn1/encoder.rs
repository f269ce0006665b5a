//! DER encoder.
//!
//! Encodes an [`Element`] tree back to bytes. Raw elements emit their
//! stored content octets verbatim, so a decode/encode round trip of an
//! unmodified tree reproduces the input exactly. That property is what
//! signature verification over re-encoded substructures relies on.

use {
    super::{
        element::{Element, Value},
        error::Asn1Error,
        object_identifier::encode_base128,
        tag::{TagClass, TagEnvironment, TypeId},
    },
    bytes::BufMut,
    num_bigint::BigUint,
};

/// Encode one element, honoring any attached context tag.
pub fn encode(element: &Element) -> Result<Vec<u8>, Asn1Error> {
    let mut out = Vec::new();
    encode_into(element, &mut out)?;
    Ok(out)
}

/// Encode into an existing buffer.
pub fn encode_into<B: BufMut>(element: &Element, buf: &mut B) -> Result<(), Asn1Error> {
    let mut body = Vec::new();
    encode_bare(element, &mut body)?;
    match element.tag() {
        None => buf.put_slice(&body),
        Some(tag) => match tag.environment {
            TagEnvironment::Explicit => {
                // The tag wraps the complete inner encoding.
                put_identifier(buf, tag.class, true, &tag.number);
                put_length(buf, body.len());
                buf.put_slice(&body);
            }
            TagEnvironment::Implicit => {
                // The tag replaces the inner identifier octets.
                let header = identifier_length(&body)?;
                put_identifier(buf, tag.class, element.is_constructed(), &tag.number);
                buf.put_slice(&body[header..]);
            }
        },
    }
    Ok(())
}

/// Encode the element's own TLV, ignoring any context tag.
fn encode_bare(element: &Element, out: &mut Vec<u8>) -> Result<(), Asn1Error> {
    let content = encode_content(element)?;
    put_identifier(
        out,
        element.class(),
        element.is_constructed(),
        &element.type_id(),
    );
    put_length(out, content.len());
    out.extend_from_slice(&content);
    Ok(())
}

fn encode_content(element: &Element) -> Result<Vec<u8>, Asn1Error> {
    Ok(match element.value() {
        Value::Boolean(value) => vec![if *value { 0xFF } else { 0x00 }],
        Value::Integer(value) | Value::Enumerated(value) => {
            let bytes = value.to_signed_bytes_be();
            // BigInt encodes zero as no bytes; INTEGER needs one octet.
            if bytes.is_empty() {
                vec![0]
            } else {
                bytes
            }
        }
        Value::BitString(bits) => {
            let mut content = Vec::with_capacity(bits.bytes.len() + 1);
            content.push(bits.unused_bits);
            content.extend_from_slice(&bits.bytes);
            content
        }
        Value::OctetString(bytes) => bytes.clone(),
        Value::Null => Vec::new(),
        Value::ObjectIdentifier(oid) => oid.to_der_value()?,
        Value::Utf8String(text) | Value::PrintableString(text) => text.as_bytes().to_vec(),
        Value::UtcTime(time) => time.to_string().into_bytes(),
        Value::GeneralizedTime(time) => time.to_string().into_bytes(),
        Value::Sequence(children)
        | Value::Set(children)
        | Value::RawConstructed { children, .. } => {
            let mut content = Vec::new();
            for child in children {
                encode_into(child, &mut content)?;
            }
            content
        }
        Value::RawPrimitive { bytes, .. } => bytes.clone(),
    })
}

fn put_identifier<B: BufMut>(buf: &mut B, class: TagClass, constructed: bool, number: &TypeId) {
    let leading = class.identifier_bits() | if constructed { 0x20 } else { 0x00 };
    match number {
        TypeId::Small(number) if *number < 31 => buf.put_u8(leading | *number as u8),
        _ => {
            buf.put_u8(leading | 0x1F);
            let value = match number {
                TypeId::Small(number) => BigUint::from(*number),
                TypeId::Big(number) => number.clone(),
            };
            let mut arcs = Vec::new();
            encode_base128(&mut arcs, &value);
            buf.put_slice(&arcs);
        }
    }
}

fn put_length<B: BufMut>(buf: &mut B, length: usize) {
    if length < 0x80 {
        buf.put_u8(length as u8);
        return;
    }
    let bytes = length.to_be_bytes();
    let skip = bytes.iter().take_while(|&&byte| byte == 0).count();
    buf.put_u8(0x80 | (bytes.len() - skip) as u8);
    buf.put_slice(&bytes[skip..]);
}

/// Length of the identifier octets at the start of an encoded TLV.
fn identifier_length(encoded: &[u8]) -> Result<usize, Asn1Error> {
    let first = *encoded
        .first()
        .ok_or_else(|| Asn1Error::encoding("empty encoding"))?;
    if first & 0x1F != 0x1F {
        return Ok(1);
    }
    let continued = encoded[1..]
        .iter()
        .take_while(|&&byte| byte & 0x80 != 0)
        .count();
    Ok(continued + 2)
}

#[cfg(test)]
mod tests {
    use {
        super::{super::decoder::decode, super::tag::Tag, *},
        hex_literal::hex,
        num_bigint::BigInt,
    };

    #[test]
    fn short_and_long_length_forms() {
        let boundary = encode(&Element::octet_string(vec![0u8; 127])).unwrap();
        assert_eq!(&boundary[..2], &hex!("04 7F"));

        let long = encode(&Element::octet_string(vec![0u8; 128])).unwrap();
        assert_eq!(&long[..3], &hex!("04 81 80"));
    }

    #[test]
    fn integer_edge_values() {
        assert_eq!(encode(&Element::integer(0)).unwrap(), hex!("02 01 00"));
        assert_eq!(encode(&Element::integer(-1)).unwrap(), hex!("02 01 FF"));
        assert_eq!(encode(&Element::integer(128)).unwrap(), hex!("02 02 00 80"));
    }

    #[test]
    fn explicit_tag_wraps_the_inner_encoding() {
        let element = Element::integer(5).with_tag(Tag::explicit(0));
        assert_eq!(encode(&element).unwrap(), hex!("A0 03 02 01 05"));
    }

    #[test]
    fn implicit_tag_replaces_the_identifier() {
        let element = Element::octet_string(b"hi".to_vec()).with_tag(Tag::implicit(2));
        assert_eq!(encode(&element).unwrap(), hex!("82 02 68 69"));
    }

    #[test]
    fn decode_encode_round_trip_preserves_bytes() {
        // A structure mixing recognized and raw elements.
        let input = hex!(
            "30 17"
            "  02 01 2A"          // INTEGER 42
            "  A0 03 02 01 07"    // [0] explicit INTEGER 7
            "  86 03 61 62 63"    // [6] primitive, kept raw
            "  31 06 0C 04 74 65 73 74" // SET { UTF8String "test" }
            "  05 00"             // NULL
        );
        let element = decode(&input).unwrap();
        assert_eq!(encode(&element).unwrap(), input);
    }

    #[test]
    fn round_trips_large_integers() {
        let serial = BigInt::parse_bytes(b"123456789012345678901234567890", 10).unwrap();
        let encoded = encode(&Element::integer(serial.clone())).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.as_integer().unwrap(), &serial);
    }
}
