//! Positional field extraction from decoded certificates.
//!
//! A decoded certificate is `SEQUENCE { tbsCertificate, signatureAlgorithm,
//! signatureValue }` (RFC 5280 4.1). Inside the TBS, the version is a [0]
//! tagged element and everything else is located by counting untagged
//! SEQUENCEs, which keeps the navigation stable across v1/v3 certificates.

use {
    super::CertificateError,
    crate::{
        asn1::{
            self, encode, tag::universal, Element, ObjectIdentifier, TagClass, TagEnvironment,
        },
        oid,
    },
    num_bigint::BigInt,
};

fn tbs_certificate(certificate: &Element) -> Result<&Element, CertificateError> {
    certificate
        .at(0)
        .filter(|tbs| tbs.require_sequence().is_ok())
        .ok_or_else(|| CertificateError::structure("missing tbsCertificate"))
}

/// Untagged SEQUENCE number `n` inside the TBS: 0 = signature algorithm,
/// 1 = issuer, 2 = validity, 3 = subject, 4 = subjectPublicKeyInfo.
fn tbs_sequence<'a>(
    certificate: &'a Element,
    n: usize,
    what: &str,
) -> Result<&'a Element, CertificateError> {
    tbs_certificate(certificate)?
        .nth_child_of_type(n, universal::SEQUENCE, TagClass::Universal, None)
        .ok_or_else(|| CertificateError::structure(format!("missing {what}")))
}

/// The DER bytes of the to-be-signed portion, re-encoded from the tree.
pub fn extract_tbs_der(certificate: &Element) -> Result<Vec<u8>, CertificateError> {
    Ok(encode(tbs_certificate(certificate)?)?)
}

pub fn extract_serial_number(certificate: &Element) -> Result<BigInt, CertificateError> {
    tbs_certificate(certificate)?
        .first_child_of_type(universal::INTEGER, TagClass::Universal, None)
        .and_then(Element::as_integer)
        .cloned()
        .ok_or_else(|| CertificateError::structure("missing serialNumber"))
}

/// Serial number as the INTEGER content octets (big-endian, two's
/// complement), the form hashed into OCSP CertIDs.
pub fn extract_serial_number_der(certificate: &Element) -> Result<Vec<u8>, CertificateError> {
    Ok(extract_serial_number(certificate)?.to_signed_bytes_be())
}

pub fn extract_issuer(certificate: &Element) -> Result<&Element, CertificateError> {
    tbs_sequence(certificate, 1, "issuer")
}

pub fn extract_subject(certificate: &Element) -> Result<&Element, CertificateError> {
    tbs_sequence(certificate, 3, "subject")
}

pub fn extract_issuer_der(certificate: &Element) -> Result<Vec<u8>, CertificateError> {
    Ok(encode(extract_issuer(certificate)?)?)
}

pub fn extract_subject_der(certificate: &Element) -> Result<Vec<u8>, CertificateError> {
    Ok(encode(extract_subject(certificate)?)?)
}

pub fn extract_issuer_dn(certificate: &Element) -> Result<String, CertificateError> {
    Ok(dn_string(extract_issuer(certificate)?))
}

pub fn extract_subject_dn(certificate: &Element) -> Result<String, CertificateError> {
    Ok(dn_string(extract_subject(certificate)?))
}

/// Validity window as UNIX timestamps `(not_before, not_after)`. Both
/// UTCTime and GeneralizedTime encodings are accepted.
pub fn extract_validity(certificate: &Element) -> Result<(i64, i64), CertificateError> {
    let validity = tbs_sequence(certificate, 2, "validity")?;
    let not_before = validity
        .at(0)
        .and_then(Element::as_timestamp)
        .ok_or_else(|| CertificateError::structure("missing notBefore"))?;
    let not_after = validity
        .at(1)
        .and_then(Element::as_timestamp)
        .ok_or_else(|| CertificateError::structure("missing notAfter"))?;
    Ok((not_before, not_after))
}

pub fn subject_public_key_info(certificate: &Element) -> Result<&Element, CertificateError> {
    tbs_sequence(certificate, 4, "subjectPublicKeyInfo")
}

/// Content of the SPKI public-key BIT STRING, the input to OCSP's
/// issuerKeyHash.
pub fn extract_subject_public_key_bytes(
    certificate: &Element,
) -> Result<&[u8], CertificateError> {
    subject_public_key_info(certificate)?
        .at(1)
        .and_then(Element::as_bit_string)
        .map(|bits| bits.bytes.as_slice())
        .ok_or_else(|| CertificateError::structure("missing subjectPublicKey"))
}

pub fn public_key_algorithm_oid(
    certificate: &Element,
) -> Result<&ObjectIdentifier, CertificateError> {
    subject_public_key_info(certificate)?
        .at(0)
        .and_then(|algorithm| algorithm.at(0))
        .and_then(Element::as_object_identifier)
        .ok_or_else(|| CertificateError::structure("missing public key algorithm"))
}

pub fn signature_algorithm_oid(
    certificate: &Element,
) -> Result<&ObjectIdentifier, CertificateError> {
    certificate
        .at(1)
        .and_then(|algorithm| algorithm.at(0))
        .and_then(Element::as_object_identifier)
        .ok_or_else(|| CertificateError::structure("missing signature algorithm"))
}

/// Content of the certificate's signature BIT STRING.
pub fn extract_signature_bytes(certificate: &Element) -> Result<&[u8], CertificateError> {
    certificate
        .at(2)
        .and_then(Element::as_bit_string)
        .map(|bits| bits.bytes.as_slice())
        .ok_or_else(|| CertificateError::structure("missing signatureValue"))
}

/// Content of an extension's extnValue OCTET STRING, by extension OID.
fn extension_value<'a>(
    certificate: &'a Element,
    target: &str,
) -> Result<Option<&'a [u8]>, CertificateError> {
    let tbs = tbs_certificate(certificate)?;
    let Some(extensions) =
        tbs.first_child_of_type(3, TagClass::ContextSpecific, Some(TagEnvironment::Explicit))
    else {
        return Ok(None);
    };
    for extension in extensions.children() {
        let fields = extension
            .require_sequence()
            .map_err(|_| CertificateError::structure("extension is not a SEQUENCE"))?;
        let matches = fields
            .first()
            .and_then(Element::as_object_identifier)
            .is_some_and(|extn_id| extn_id == target);
        if matches {
            // extnValue is the last field; critical is optional before it.
            return fields
                .last()
                .and_then(Element::as_octet_string)
                .map(Some)
                .ok_or_else(|| CertificateError::structure("extension value missing"));
        }
    }
    Ok(None)
}

/// SubjectKeyIdentifier extension content (RFC 5280 4.2.1.2), if present.
pub fn extract_subject_key_identifier(
    certificate: &Element,
) -> Result<Option<Vec<u8>>, CertificateError> {
    let Some(value) = extension_value(certificate, oid::SUBJECT_KEY_IDENTIFIER)? else {
        return Ok(None);
    };
    let identifier = asn1::decode(value)?
        .as_octet_string()
        .map(<[u8]>::to_vec)
        .ok_or_else(|| CertificateError::structure("subjectKeyIdentifier is not an OCTET STRING"))?;
    Ok(Some(identifier))
}

/// URL of the OCSP responder from the authority-information-access
/// extension, if any.
pub fn extract_ocsp_responder_url(
    certificate: &Element,
) -> Result<Option<String>, CertificateError> {
    access_location(certificate, oid::AD_OCSP)
}

/// URL where the issuer certificate can be fetched (caIssuers access
/// method), if any.
pub fn extract_issuer_certificate_url(
    certificate: &Element,
) -> Result<Option<String>, CertificateError> {
    access_location(certificate, oid::AD_CA_ISSUERS)
}

fn access_location(
    certificate: &Element,
    method: &str,
) -> Result<Option<String>, CertificateError> {
    let Some(value) = extension_value(certificate, oid::AUTHORITY_INFO_ACCESS)? else {
        return Ok(None);
    };
    let descriptions = asn1::decode(value)?;
    for description in descriptions.children() {
        let matches = description
            .at(0)
            .and_then(Element::as_object_identifier)
            .is_some_and(|access_method| access_method == method);
        if !matches {
            continue;
        }
        // uniformResourceIdentifier is [6] IMPLICIT IA5String.
        let Some(location) = description.first_child_of_type(6, TagClass::ContextSpecific, None)
        else {
            continue;
        };
        let url = location
            .as_raw_bytes()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .ok_or_else(|| CertificateError::structure("accessLocation is not primitive"))?;
        return Ok(Some(url));
    }
    Ok(None)
}

/// Render a Name as a string like `CN=example, O=org, C=US`, most-specific
/// attribute first. OIDs without a short code render dotted.
pub fn dn_string(name: &Element) -> String {
    let mut parts: Vec<String> = name
        .children()
        .iter()
        .map(|rdn| {
            rdn.children()
                .iter()
                .filter_map(|attribute| {
                    let oid = attribute.at(0)?.as_object_identifier()?;
                    let code = oid::dn_code(oid.as_str())
                        .map(str::to_owned)
                        .unwrap_or_else(|| oid.to_string());
                    Some(format!("{code}={}", attribute_string(attribute.at(1)?)))
                })
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect();
    parts.reverse();
    parts.join(", ")
}

fn attribute_string(value: &Element) -> String {
    if let Some(text) = value.as_string() {
        text.to_owned()
    } else if let Some(bytes) = value.as_raw_bytes() {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::asn1::Tag};

    fn attribute(oid: &str, value: &str) -> Element {
        Element::set(vec![Element::sequence(vec![
            Element::oid(oid),
            Element::utf8_string(value),
        ])])
    }

    fn name(attributes: Vec<Element>) -> Element {
        Element::sequence(attributes)
    }

    /// An unsigned certificate skeleton with the fields the extractors
    /// navigate.
    fn skeleton() -> Element {
        let validity = Element::sequence(vec![
            Element::generalized_time(
                crate::asn1::GeneralizedTime::new(2024, 1, 1, 0, 0, 0).unwrap(),
            ),
            Element::generalized_time(
                crate::asn1::GeneralizedTime::new(2034, 1, 1, 0, 0, 0).unwrap(),
            ),
        ]);
        let spki = Element::sequence(vec![
            Element::sequence(vec![Element::oid(oid::RSA_ENCRYPTION), Element::null()]),
            Element::bit_string(vec![0x30, 0x00], 0),
        ]);
        let tbs = Element::sequence(vec![
            Element::integer(2).with_tag(Tag::explicit(0)),
            Element::integer(0x1234),
            Element::sequence(vec![Element::oid(oid::SHA256_WITH_RSA), Element::null()]),
            name(vec![attribute("2.5.4.3", "Issuing CA")]),
            validity,
            name(vec![
                attribute("2.5.4.6", "US"),
                attribute("2.5.4.3", "leaf.example"),
            ]),
            spki,
        ]);
        Element::sequence(vec![
            tbs,
            Element::sequence(vec![Element::oid(oid::SHA256_WITH_RSA), Element::null()]),
            Element::bit_string(vec![0xAA, 0xBB], 0),
        ])
    }

    #[test]
    fn navigates_the_tbs_positionally() {
        let certificate = skeleton();
        assert_eq!(
            extract_serial_number(&certificate).unwrap(),
            BigInt::from(0x1234)
        );
        assert_eq!(extract_issuer_dn(&certificate).unwrap(), "CN=Issuing CA");
        assert_eq!(
            extract_subject_dn(&certificate).unwrap(),
            "CN=leaf.example, C=US"
        );
        assert_eq!(
            extract_validity(&certificate).unwrap(),
            (1704067200, 2019686400)
        );
        assert_eq!(
            public_key_algorithm_oid(&certificate).unwrap(),
            oid::RSA_ENCRYPTION
        );
        assert_eq!(
            extract_signature_bytes(&certificate).unwrap(),
            &[0xAA, 0xBB]
        );
    }

    #[test]
    fn missing_extensions_are_not_an_error() {
        let certificate = skeleton();
        assert_eq!(extract_ocsp_responder_url(&certificate).unwrap(), None);
        assert_eq!(extract_subject_key_identifier(&certificate).unwrap(), None);
    }

    #[test]
    fn reads_authority_info_access() {
        let access = Element::sequence(vec![
            Element::sequence(vec![
                Element::oid(oid::AD_OCSP),
                Element::raw_primitive(6u32, TagClass::ContextSpecific, b"http://ocsp.example".to_vec()),
            ]),
            Element::sequence(vec![
                Element::oid(oid::AD_CA_ISSUERS),
                Element::raw_primitive(6u32, TagClass::ContextSpecific, b"http://ca.example/ca.der".to_vec()),
            ]),
        ]);
        let extension = Element::sequence(vec![
            Element::oid(oid::AUTHORITY_INFO_ACCESS),
            Element::octet_string(encode(&access).unwrap()),
        ]);
        let mut certificate = skeleton();
        // Rebuild with an extensions block appended to the TBS.
        let tbs_children = {
            let mut children = certificate.at(0).unwrap().children().to_vec();
            children.push(
                Element::sequence(vec![extension]).with_tag(Tag::explicit(3)),
            );
            children
        };
        let mut outer = certificate.children().to_vec();
        outer[0] = Element::sequence(tbs_children);
        certificate = Element::sequence(outer);

        assert_eq!(
            extract_ocsp_responder_url(&certificate).unwrap().as_deref(),
            Some("http://ocsp.example")
        );
        assert_eq!(
            extract_issuer_certificate_url(&certificate)
                .unwrap()
                .as_deref(),
            Some("http://ca.example/ca.der")
        );
    }
}
