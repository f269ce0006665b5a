//! BER/DER decoder.
//!
//! Decodes a byte stream into an [`Element`] tree. Recognized universal
//! types become native values; everything else is preserved as raw
//! primitive or constructed elements so the tree re-encodes to the exact
//! input bytes.

use {
    super::{
        element::Element,
        error::Asn1Error,
        object_identifier::ObjectIdentifier,
        tag::{universal, Tag, TagClass, TagEnvironment, TypeId},
        time::{GeneralizedTime, UtcTime},
    },
    num_bigint::{BigInt, BigUint},
    num_traits::Zero,
};

/// Decode one element occupying the whole input. Trailing bytes after the
/// element are an error.
pub fn decode(bytes: &[u8]) -> Result<Element, Asn1Error> {
    let mut cursor = Cursor { bytes, position: 0 };
    let element = cursor.read_element()?;
    if cursor.position != bytes.len() {
        return Err(Asn1Error::decoding(format!(
            "{} trailing bytes after the element",
            bytes.len() - cursor.position
        )));
    }
    Ok(element)
}

struct Cursor<'a> {
    bytes:    &'a [u8],
    position: usize,
}

struct Identifier {
    class:       TagClass,
    constructed: bool,
    number:      TypeId,
}

impl Cursor<'_> {
    fn read_byte(&mut self) -> Result<u8, Asn1Error> {
        let byte = *self
            .bytes
            .get(self.position)
            .ok_or_else(|| Asn1Error::decoding("unexpected end of input"))?;
        self.position += 1;
        Ok(byte)
    }

    fn read_slice(&mut self, length: usize) -> Result<&[u8], Asn1Error> {
        let end = self
            .position
            .checked_add(length)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| Asn1Error::decoding("content length exceeds input"))?;
        let slice = &self.bytes[self.position..end];
        self.position = end;
        Ok(slice)
    }

    fn read_identifier(&mut self) -> Result<Identifier, Asn1Error> {
        let octet = self.read_byte()?;
        let class = TagClass::from_identifier_octet(octet);
        let constructed = octet & 0x20 != 0;
        let number = if octet & 0x1F != 0x1F {
            TypeId::Small(u32::from(octet & 0x1F))
        } else {
            // Multi-byte tag number, base-128 with continuation bits.
            let mut value = BigUint::zero();
            loop {
                let byte = self.read_byte()?;
                if value.is_zero() && byte == 0x80 {
                    return Err(Asn1Error::decoding("non-minimal tag number"));
                }
                value = (value << 7) | BigUint::from(byte & 0x7F);
                if byte & 0x80 == 0 {
                    break;
                }
            }
            TypeId::from_big(value)
        };
        Ok(Identifier {
            class,
            constructed,
            number,
        })
    }

    fn read_length(&mut self) -> Result<usize, Asn1Error> {
        let first = self.read_byte()?;
        if first < 0x80 {
            return Ok(usize::from(first));
        }
        if first == 0x80 {
            return Err(Asn1Error::decoding("indefinite lengths are not supported"));
        }
        let count = usize::from(first & 0x7F);
        if count > std::mem::size_of::<usize>() {
            return Err(Asn1Error::decoding("length too large"));
        }
        let mut length = 0usize;
        for _ in 0..count {
            length = (length << 8) | usize::from(self.read_byte()?);
        }
        Ok(length)
    }

    fn read_element(&mut self) -> Result<Element, Asn1Error> {
        let identifier = self.read_identifier()?;
        let length = self.read_length()?;
        let content = self.read_slice(length)?;
        if identifier.class == TagClass::Universal {
            decode_universal(&identifier, content)
        } else if identifier.constructed {
            decode_tagged_constructed(&identifier, content)
        } else {
            Ok(Element::raw_primitive(
                identifier.number,
                identifier.class,
                content.to_vec(),
            ))
        }
    }
}

fn decode_children(content: &[u8]) -> Result<Vec<Element>, Asn1Error> {
    let mut cursor = Cursor {
        bytes:    content,
        position: 0,
    };
    let mut children = Vec::new();
    while cursor.position < content.len() {
        children.push(cursor.read_element()?);
    }
    Ok(children)
}

fn decode_universal(identifier: &Identifier, content: &[u8]) -> Result<Element, Asn1Error> {
    let number = match identifier.number.as_u32() {
        Some(number) => number,
        None => return raw(identifier, content),
    };
    if identifier.constructed {
        return match number {
            universal::SEQUENCE => Ok(Element::sequence(decode_children(content)?)),
            universal::SET => Ok(Element::set(decode_children(content)?)),
            // Constructed encodings of string types are legal BER; keep
            // them raw rather than flattening their segments.
            _ => raw(identifier, content),
        };
    }
    match number {
        universal::BOOLEAN => {
            let [byte] = content else {
                return Err(Asn1Error::decoding("BOOLEAN must be one byte"));
            };
            Ok(Element::boolean(*byte != 0))
        }
        universal::INTEGER => Ok(Element::integer(decode_integer(content)?)),
        universal::ENUMERATED => Ok(Element::enumerated(decode_integer(content)?)),
        universal::BIT_STRING => {
            let (&unused_bits, bytes) = content
                .split_first()
                .ok_or_else(|| Asn1Error::decoding("empty BIT STRING"))?;
            if unused_bits > 7 || (unused_bits > 0 && bytes.is_empty()) {
                return Err(Asn1Error::decoding("invalid BIT STRING unused-bit count"));
            }
            Ok(Element::bit_string(bytes.to_vec(), unused_bits))
        }
        universal::OCTET_STRING => Ok(Element::octet_string(content)),
        universal::NULL => {
            if !content.is_empty() {
                return Err(Asn1Error::decoding("NULL must be empty"));
            }
            Ok(Element::null())
        }
        universal::OBJECT_IDENTIFIER => Ok(Element::object_identifier(
            ObjectIdentifier::from_der_value(content)?,
        )),
        universal::UTF8_STRING => {
            let text = String::from_utf8(content.to_vec())
                .map_err(|_| Asn1Error::decoding("UTF8String is not valid UTF-8"))?;
            Ok(Element::utf8_string(text))
        }
        universal::PRINTABLE_STRING => {
            if !content.iter().all(|&byte| is_printable(byte)) {
                return Err(Asn1Error::decoding(
                    "PrintableString contains characters outside its alphabet",
                ));
            }
            Ok(Element::printable_string(
                String::from_utf8_lossy(content).into_owned(),
            ))
        }
        universal::UTC_TIME => Ok(Element::utc_time(UtcTime::parse(content)?)),
        universal::GENERALIZED_TIME => {
            Ok(Element::generalized_time(GeneralizedTime::parse(content)?))
        }
        universal::SEQUENCE | universal::SET => {
            Err(Asn1Error::decoding("SEQUENCE and SET must be constructed"))
        }
        _ => raw(identifier, content),
    }
}

/// A constructed non-universal element that holds exactly one child is an
/// explicitly tagged value: the child is returned with the tag attached,
/// so lookups by context tag find the underlying element directly.
fn decode_tagged_constructed(
    identifier: &Identifier,
    content: &[u8],
) -> Result<Element, Asn1Error> {
    let mut children = decode_children(content)?;
    if children.len() == 1 && children[0].tag().is_none() {
        let child = children.pop().expect("length checked");
        return Ok(child.with_tag(Tag {
            number:      identifier.number.clone(),
            class:       identifier.class,
            environment: TagEnvironment::Explicit,
        }));
    }
    Ok(Element::raw_constructed(
        identifier.number.clone(),
        identifier.class,
        children,
    ))
}

fn raw(identifier: &Identifier, content: &[u8]) -> Result<Element, Asn1Error> {
    if identifier.constructed {
        Ok(Element::raw_constructed(
            identifier.number.clone(),
            identifier.class,
            decode_children(content)?,
        ))
    } else {
        Ok(Element::raw_primitive(
            identifier.number.clone(),
            identifier.class,
            content.to_vec(),
        ))
    }
}

/// The PrintableString alphabet (X.680 41.4): letters, digits, and the
/// eleven punctuation characters `'()+,-./:=?` plus space.
fn is_printable(byte: u8) -> bool {
    matches!(
        byte,
        b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b' '
            | b'\''
            | b'('
            | b')'
            | b'+'
            | b','
            | b'-'
            | b'.'
            | b'/'
            | b':'
            | b'='
            | b'?'
    )
}

fn decode_integer(content: &[u8]) -> Result<BigInt, Asn1Error> {
    if content.is_empty() {
        return Err(Asn1Error::decoding("empty INTEGER"));
    }
    Ok(BigInt::from_signed_bytes_be(content))
}

#[cfg(test)]
mod tests {
    use {super::*, crate::asn1::Value, hex_literal::hex};

    #[test]
    fn decodes_a_simple_sequence() {
        // SEQUENCE { INTEGER 1, BOOLEAN TRUE }
        let element = decode(&hex!("30 06 02 01 01 01 01 FF")).unwrap();
        let children = element.require_sequence().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].as_integer().unwrap(), &BigInt::from(1));
        assert_eq!(children[1].as_boolean(), Some(true));
    }

    #[test]
    fn decodes_negative_integers() {
        let element = decode(&hex!("02 01 FF")).unwrap();
        assert_eq!(element.as_integer().unwrap(), &BigInt::from(-1));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let err = decode(&hex!("05 00 00")).unwrap_err();
        assert!(matches!(err, Asn1Error::Decoding(_)));
    }

    #[test]
    fn rejects_indefinite_lengths() {
        assert!(decode(&hex!("30 80 05 00 00 00")).is_err());
    }

    #[test]
    fn long_form_lengths() {
        let mut input = vec![0x04, 0x81, 0x80];
        input.extend(std::iter::repeat(0xAB).take(128));
        let element = decode(&input).unwrap();
        assert_eq!(element.as_octet_string().unwrap().len(), 128);
    }

    #[test]
    fn single_child_context_element_becomes_tagged_child() {
        // [0] { SEQUENCE {} }
        let element = decode(&hex!("A0 02 30 00")).unwrap();
        let tag = element.tag().unwrap();
        assert_eq!(tag.number, 0u32);
        assert_eq!(tag.class, TagClass::ContextSpecific);
        assert_eq!(tag.environment, TagEnvironment::Explicit);
        assert!(element.require_sequence().is_ok());
    }

    #[test]
    fn multi_child_context_element_stays_raw() {
        // [1] { NULL, NULL }
        let element = decode(&hex!("A1 04 05 00 05 00")).unwrap();
        assert!(element.tag().is_none());
        assert!(matches!(element.value(), Value::RawConstructed { .. }));
        assert_eq!(element.children().len(), 2);
    }

    #[test]
    fn context_primitive_preserves_bytes() {
        let element = decode(&hex!("86 03 61 62 63")).unwrap();
        assert_eq!(element.as_raw_bytes(), Some(&b"abc"[..]));
        assert_eq!(element.class(), TagClass::ContextSpecific);
        assert_eq!(element.type_id(), 6u32);
    }

    #[test]
    fn multi_byte_tag_numbers() {
        // Application tag 1000, primitive, empty content.
        let element = decode(&hex!("5F 87 68 00")).unwrap();
        assert_eq!(element.type_id(), 1000u32);
        assert_eq!(element.class(), TagClass::Application);
    }

    #[test]
    fn printable_string_alphabet_is_enforced() {
        // "Test 1?" uses only alphabet characters.
        let element = decode(&hex!("13 07 54 65 73 74 20 31 3F")).unwrap();
        assert_eq!(element.as_string(), Some("Test 1?"));
        // "a@b" and "_" are ASCII but outside the alphabet.
        assert!(decode(&hex!("13 03 61 40 62")).is_err());
        assert!(decode(&hex!("13 01 5F")).is_err());
        assert!(decode(&hex!("13 01 00")).is_err());
    }

    #[test]
    fn decodes_bit_strings() {
        let element = decode(&hex!("03 02 07 80")).unwrap();
        let bits = element.as_bit_string().unwrap();
        assert_eq!(bits.unused_bits, 7);
        assert!(bits.bit(0));
        assert!(!bits.bit(1));
    }
}
