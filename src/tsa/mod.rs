//! RFC 3161 timestamp requests and token validation.
//!
//! Tokens are CMS SignedData (RFC 3852) carrying a TSTInfo. Validation
//! re-encodes the signed attributes as a plain SET, the form the signature
//! was computed over, and checks the signer certificate's chain and
//! optionally its live OCSP status.

use {
    crate::{
        asn1::{
            self, encode, now_unix, tag::universal, Element, ObjectIdentifier, TagClass,
            TagEnvironment,
        },
        crypto::HashAlg,
        oid,
        ocsp::{CertStatus, Ocsp, OcspError},
        transport::{Transport, TransportError},
        x509::{
            certificate_from_bytes, extract_issuer_certificate_url, extract_issuer_dn,
            extract_ocsp_responder_url, extract_serial_number, extract_subject_dn,
            extract_validity, validate_certificate, verify_with_certificate, CertificateError,
            VerificationError,
        },
    },
    num_bigint::{BigInt, Sign},
    num_traits::ToPrimitive,
    rand::Rng,
    subtle::ConstantTimeEq,
    thiserror::Error,
    tracing::{debug, warn},
};

pub const TIMESTAMP_QUERY_MEDIA_TYPE: &str = "application/timestamp-query";
pub const TIMESTAMP_REPLY_MEDIA_TYPE: &str = "application/timestamp-reply";

/// PKIFailureInfo bits a TSA can set when rejecting a request
/// (RFC 3161 2.4.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TsaFailure {
    BadAlg,
    BadRequest,
    BadDataFormat,
    TimeNotAvailable,
    UnacceptedPolicy,
    UnacceptedExtension,
    AddInfoNotAvailable,
    SystemFailure,
}

impl TsaFailure {
    pub fn from_bit(bit: usize) -> Option<Self> {
        Some(match bit {
            0 => Self::BadAlg,
            2 => Self::BadRequest,
            5 => Self::BadDataFormat,
            14 => Self::TimeNotAvailable,
            15 => Self::UnacceptedPolicy,
            16 => Self::UnacceptedExtension,
            17 => Self::AddInfoNotAvailable,
            25 => Self::SystemFailure,
            _ => return None,
        })
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::BadAlg => "unrecognized or unsupported algorithm identifier",
            Self::BadRequest => "transaction not permitted or supported",
            Self::BadDataFormat => "the data submitted has the wrong format",
            Self::TimeNotAvailable => "the TSA's time source is not available",
            Self::UnacceptedPolicy => "the requested TSA policy is not supported",
            Self::UnacceptedExtension => "the requested extension is not supported",
            Self::AddInfoNotAvailable => {
                "the additional information requested could not be understood or is not available"
            }
            Self::SystemFailure => "the request cannot be handled due to system failure",
        }
    }
}

impl std::fmt::Display for TsaFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Error)]
pub enum TsaError {
    #[error("timestamp request rejected (status {status}): {reason}")]
    Rejected { status: i64, reason: String },
    #[error("response carries no timestamp token")]
    MissingToken,
    #[error("message imprint does not match the supplied data")]
    ImprintMismatch,
    #[error("token verification failed: {0}")]
    Verification(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Certificate(#[from] CertificateError),
    #[error(transparent)]
    Chain(#[from] VerificationError),
    #[error(transparent)]
    Asn1(#[from] asn1::Asn1Error),
    #[error(transparent)]
    Ocsp(#[from] OcspError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Request knobs. Defaults ask for a SHA-512 imprint, a fresh nonce and
/// the signer certificate in the token.
#[derive(Clone, Debug)]
pub struct TsaOptions {
    pub hash:     HashAlg,
    pub nonce:    bool,
    pub cert_req: bool,
    pub policy:   Option<ObjectIdentifier>,
}

impl Default for TsaOptions {
    fn default() -> Self {
        Self {
            hash:     HashAlg::Sha512,
            nonce:    true,
            cert_req: true,
            policy:   None,
        }
    }
}

/// RFC 3161 client engine.
#[derive(Clone, Debug, Default)]
pub struct Tsa {
    pub options: TsaOptions,
}

impl Tsa {
    pub fn new(options: TsaOptions) -> Self {
        Self { options }
    }

    /// Encode a TimeStampReq over `data`.
    pub fn build_request(&self, data: &[u8]) -> Result<Vec<u8>, TsaError> {
        let imprint = self.options.hash.digest(data);
        let message_imprint = Element::sequence(vec![
            Element::sequence(vec![
                Element::oid(oid::digest_oid(self.options.hash)),
                Element::null(),
            ]),
            Element::octet_string(imprint),
        ]);
        let mut fields = vec![Element::integer(1), message_imprint];
        if let Some(policy) = &self.options.policy {
            fields.push(Element::object_identifier(policy.clone()));
        }
        if self.options.nonce {
            let nonce: [u8; 8] = rand::thread_rng().gen();
            fields.push(Element::integer(BigInt::from_bytes_be(Sign::Plus, &nonce)));
        }
        if self.options.cert_req {
            fields.push(Element::boolean(true));
        }
        Ok(encode(&Element::sequence(fields))?)
    }

    /// Round trip: POST a request for `data` to the authority and return
    /// the timestamp token DER. The token is not validated here.
    pub fn request_timestamp(
        &self,
        data: &[u8],
        url: &str,
        transport: &dyn Transport,
    ) -> Result<Vec<u8>, TsaError> {
        let body = self.build_request(data)?;
        debug!(url, "requesting timestamp");
        let raw = transport.send(url, &body, TIMESTAMP_QUERY_MEDIA_TYPE, TIMESTAMP_REPLY_MEDIA_TYPE)?;
        self.decode_response(&raw)
    }

    /// Decode a TimeStampResp, mapping rejections to errors, and return
    /// the token DER.
    pub fn decode_response(&self, raw: &[u8]) -> Result<Vec<u8>, TsaError> {
        let response = asn1::decode(raw)?;
        let status_info = response
            .at(0)
            .ok_or_else(|| TsaError::Verification("missing status".into()))?;
        let status = status_info
            .at(0)
            .and_then(Element::as_integer)
            .and_then(BigInt::to_i64)
            .ok_or_else(|| TsaError::Verification("missing status".into()))?;
        // 0 = granted, 1 = granted with modifications.
        if status != 0 && status != 1 {
            return Err(TsaError::Rejected {
                status,
                reason: rejection_reason(status_info),
            });
        }
        let token = response.at(1).ok_or(TsaError::MissingToken)?;
        token
            .require_sequence()
            .map_err(|_| TsaError::Verification("token is not a ContentInfo".into()))?;
        Ok(encode(token)?)
    }

    /// Validate a decoded timestamp token.
    ///
    /// - `data`, when given, must hash to the TSTInfo message imprint.
    /// - `issuer`, when given, anchors the signer certificate chain.
    /// - `transport`, when given, enables fetching a missing issuer by its
    ///   caIssuers URL and checking the signer's live OCSP status.
    pub fn validate_token(
        &self,
        token: &Element,
        data: Option<&[u8]>,
        issuer: Option<&Element>,
        transport: Option<&dyn Transport>,
    ) -> Result<(), TsaError> {
        let signed_data = signed_data(token)?;
        let (tst_info, econtent) = tst_info(signed_data)?;

        // 1. The imprint covers the caller's data.
        let imprint_fields = tst_info
            .first_child_of_type(universal::SEQUENCE, TagClass::Universal, None)
            .ok_or_else(|| TsaError::Verification("missing messageImprint".into()))?;
        let imprint_hash = imprint_algorithm(imprint_fields)?;
        let imprint = imprint_fields
            .at(1)
            .and_then(Element::as_octet_string)
            .ok_or_else(|| TsaError::Verification("missing hashedMessage".into()))?;
        if let Some(data) = data {
            let computed = imprint_hash.digest(data);
            if !bool::from(computed.as_slice().ct_eq(imprint)) {
                return Err(TsaError::ImprintMismatch);
            }
        }

        // 2. Locate the signer info and the certificate it names.
        let signer_info = first_signer_info(signed_data)?;
        let signer = self.find_signer_certificate(signed_data, signer_info)?;

        // 3. The signer certificate is inside its validity window. The
        //    issuer's window is checked once the issuer is resolved below.
        let now = now_unix();
        let (not_before, not_after) = extract_validity(&signer)?;
        if now < not_before || now > not_after {
            return Err(TsaError::Verification(
                "signer certificate is outside its validity window".into(),
            ));
        }

        // 4. The messageDigest attribute matches the eContent.
        let attributes = tagged_collection(signer_info, 0)
            .ok_or_else(|| TsaError::Verification("missing signed attributes".into()))?;
        let digest_hash = signer_digest_algorithm(signer_info)?;
        let message_digest = attribute_value(&attributes, oid::ID_MESSAGE_DIGEST)
            .and_then(Element::as_octet_string)
            .ok_or_else(|| TsaError::Verification("missing messageDigest attribute".into()))?;
        let computed = digest_hash.digest(&econtent);
        if !bool::from(computed.as_slice().ct_eq(message_digest)) {
            return Err(TsaError::Verification(
                "messageDigest attribute does not match the token content".into(),
            ));
        }

        // 5. The signature covers the signed attributes re-encoded as a
        //    plain SET (RFC 3852 5.4).
        let signed_attributes = encode(&Element::set(attributes))?;
        let signature = signer_info
            .children()
            .iter()
            .rev()
            .find_map(Element::as_octet_string)
            .ok_or_else(|| TsaError::Verification("missing signature".into()))?;
        verify_with_certificate(&signed_attributes, signature, &signer, digest_hash)?;

        // 6. The signer chains to its CA, and optionally answers Good on
        //    live OCSP.
        let embedded = embedded_certificates(signed_data);
        let chain_issuer = self
            .resolve_issuer(&signer, &embedded, issuer, transport)?
            .ok_or_else(|| TsaError::Verification("signer issuer certificate not found".into()))?;
        let (issuer_not_before, issuer_not_after) = extract_validity(&chain_issuer)?;
        if now < issuer_not_before || now > issuer_not_after {
            return Err(TsaError::Verification(
                "issuer certificate is outside its validity window".into(),
            ));
        }
        validate_certificate(&signer, &chain_issuer)?;
        if let Some(transport) = transport {
            if extract_ocsp_responder_url(&signer)?.is_some() {
                let response =
                    Ocsp::default().check_certificate(&signer, &chain_issuer, transport)?;
                if response.status != CertStatus::Good {
                    return Err(TsaError::Verification(format!(
                        "signer certificate status is {:?}",
                        response.status
                    )));
                }
            } else {
                warn!("signer certificate names no OCSP responder; skipping revocation check");
            }
        }
        Ok(())
    }

    /// As [`Self::validate_token`], starting from DER.
    pub fn validate_token_der(
        &self,
        der: &[u8],
        data: Option<&[u8]>,
        issuer: Option<&Element>,
        transport: Option<&dyn Transport>,
    ) -> Result<(), TsaError> {
        self.validate_token(&asn1::decode(der)?, data, issuer, transport)
    }

    /// The embedded certificate matching the first signer info's
    /// issuerAndSerialNumber.
    fn find_signer_certificate(
        &self,
        signed_data: &Element,
        signer_info: &Element,
    ) -> Result<Element, TsaError> {
        let version = signer_info
            .at(0)
            .and_then(Element::as_integer)
            .and_then(BigInt::to_i64)
            .ok_or_else(|| TsaError::Verification("missing signerInfo version".into()))?;
        if version == 3 {
            return Err(TsaError::Unsupported(
                "signerInfo v3 (subjectKeyIdentifier) signer identification".into(),
            ));
        }
        if version != 1 {
            return Err(TsaError::Verification(format!(
                "unrecognized signerInfo version {version}"
            )));
        }
        let sid = signer_info
            .first_child_of_type(universal::SEQUENCE, TagClass::Universal, None)
            .ok_or_else(|| TsaError::Verification("missing issuerAndSerialNumber".into()))?;
        let issuer_dn = crate::x509::dn_string(
            sid.at(0)
                .ok_or_else(|| TsaError::Verification("missing signer issuer".into()))?,
        );
        let serial = sid
            .at(1)
            .and_then(Element::as_integer)
            .ok_or_else(|| TsaError::Verification("missing signer serial".into()))?;

        for certificate in embedded_certificates(signed_data) {
            let matches = extract_issuer_dn(&certificate)? == issuer_dn
                && extract_serial_number(&certificate)? == *serial;
            if matches {
                return Ok(certificate);
            }
        }
        Err(TsaError::Verification(
            "token does not embed the signer certificate".into(),
        ))
    }

    /// Issuer of `certificate`: the caller-supplied anchor, another
    /// embedded certificate, or one fetched by its caIssuers URL.
    fn resolve_issuer(
        &self,
        certificate: &Element,
        embedded: &[Element],
        issuer: Option<&Element>,
        transport: Option<&dyn Transport>,
    ) -> Result<Option<Element>, TsaError> {
        let issuer_dn = extract_issuer_dn(certificate)?;
        if let Some(issuer) = issuer {
            if extract_subject_dn(issuer)? == issuer_dn {
                return Ok(Some(issuer.clone()));
            }
        }
        for candidate in embedded {
            if candidate != certificate && extract_subject_dn(candidate)? == issuer_dn {
                return Ok(Some(candidate.clone()));
            }
        }
        if let (Some(transport), Ok(Some(url))) =
            (transport, extract_issuer_certificate_url(certificate))
        {
            debug!(url, "fetching signer issuer certificate");
            let der = transport.fetch(&url)?;
            return Ok(Some(certificate_from_bytes(&der)?));
        }
        Ok(None)
    }
}

/// genTime from a decoded token, as a UNIX timestamp.
pub fn timestamp_from_token(token: &Element) -> Result<i64, TsaError> {
    let signed_data = signed_data(token)?;
    let (tst_info, _) = tst_info(signed_data)?;
    tst_info
        .first_child_of_type(universal::GENERALIZED_TIME, TagClass::Universal, None)
        .and_then(Element::as_timestamp)
        .ok_or_else(|| TsaError::Verification("missing genTime".into()))
}

/// Every certificate embedded in the token's SignedData.
pub fn embedded_certificates(signed_data: &Element) -> Vec<Element> {
    tagged_collection(signed_data, 0).unwrap_or_default()
}

fn signed_data(token: &Element) -> Result<&Element, TsaError> {
    let content_type = token
        .at(0)
        .and_then(Element::as_object_identifier)
        .ok_or_else(|| TsaError::Verification("token is not a ContentInfo".into()))?;
    if *content_type != oid::ID_SIGNED_DATA {
        return Err(TsaError::Verification(format!(
            "unexpected content type {content_type}"
        )));
    }
    token
        .first_child_of_type(0, TagClass::ContextSpecific, Some(TagEnvironment::Explicit))
        .ok_or_else(|| TsaError::Verification("missing SignedData".into()))
}

/// Extract the TSTInfo and the raw eContent octets it was parsed from.
fn tst_info(signed_data: &Element) -> Result<(Element, Vec<u8>), TsaError> {
    let encap = signed_data
        .first_child_of_type(universal::SEQUENCE, TagClass::Universal, None)
        .ok_or_else(|| TsaError::Verification("missing encapContentInfo".into()))?;
    let content_type = encap
        .at(0)
        .and_then(Element::as_object_identifier)
        .ok_or_else(|| TsaError::Verification("missing eContentType".into()))?;
    if *content_type != oid::ID_CT_TST_INFO {
        return Err(TsaError::Verification(format!(
            "unexpected eContentType {content_type}"
        )));
    }
    let econtent = encap
        .first_child_of_type(0, TagClass::ContextSpecific, Some(TagEnvironment::Explicit))
        .and_then(Element::as_octet_string)
        .ok_or_else(|| TsaError::Verification("missing eContent".into()))?;
    let tst_info = asn1::decode(econtent)?;
    tst_info
        .require_sequence()
        .map_err(|_| TsaError::Verification("TSTInfo is not a SEQUENCE".into()))?;
    Ok((tst_info, econtent.to_vec()))
}

fn first_signer_info(signed_data: &Element) -> Result<&Element, TsaError> {
    // digestAlgorithms is the first untagged SET, signerInfos the second.
    signed_data
        .nth_child_of_type(1, universal::SET, TagClass::Universal, None)
        .and_then(|infos| infos.at(0))
        .ok_or_else(|| TsaError::Verification("missing signerInfos".into()))
}

fn imprint_algorithm(message_imprint: &Element) -> Result<HashAlg, TsaError> {
    let algorithm = message_imprint
        .at(0)
        .and_then(|alg| alg.at(0))
        .and_then(Element::as_object_identifier)
        .ok_or_else(|| TsaError::Verification("missing imprint algorithm".into()))?;
    oid::digest_algorithm(algorithm.as_str())
        .ok_or_else(|| TsaError::Unsupported(format!("imprint algorithm {algorithm}")))
}

fn signer_digest_algorithm(signer_info: &Element) -> Result<HashAlg, TsaError> {
    // digestAlgorithm is the second untagged SEQUENCE (after
    // issuerAndSerialNumber).
    let algorithm = signer_info
        .nth_child_of_type(1, universal::SEQUENCE, TagClass::Universal, None)
        .and_then(|alg| alg.at(0))
        .and_then(Element::as_object_identifier)
        .ok_or_else(|| TsaError::Verification("missing digestAlgorithm".into()))?;
    oid::digest_algorithm(algorithm.as_str())
        .ok_or_else(|| TsaError::Unsupported(format!("digest algorithm {algorithm}")))
}

/// The children of a `[number] IMPLICIT SET/SEQUENCE OF` field. A
/// multi-child field decodes to a raw constructed; a single-child field
/// decodes to that child carrying the tag.
fn tagged_collection(parent: &Element, number: u32) -> Option<Vec<Element>> {
    for child in parent.children() {
        if let Some(tag) = child.tag() {
            if tag.class == TagClass::ContextSpecific && tag.number == number {
                return Some(vec![child.clone().untagged()]);
            }
            continue;
        }
        if child.class() == TagClass::ContextSpecific
            && child.type_id() == number
            && child.is_constructed()
        {
            return Some(child.children().to_vec());
        }
    }
    None
}

/// Value of the attribute with the given type OID, out of a signed
/// attribute list.
fn attribute_value<'a>(attributes: &'a [Element], target: &str) -> Option<&'a Element> {
    attributes.iter().find_map(|attribute| {
        let matches = attribute
            .at(0)
            .and_then(Element::as_object_identifier)
            .is_some_and(|attr_type| attr_type == target);
        if matches {
            // attrValues is a SET; the attributes we read hold one value.
            attribute.at(1).and_then(|values| values.at(0))
        } else {
            None
        }
    })
}

fn rejection_reason(status_info: &Element) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(texts) = status_info
        .children()
        .iter()
        .find(|child| child.tag().is_none() && child.require_sequence().is_ok())
    {
        parts.extend(
            texts
                .children()
                .iter()
                .filter_map(Element::as_string)
                .map(str::to_owned),
        );
    }
    let failure = status_info
        .children()
        .iter()
        .find_map(Element::as_bit_string)
        .and_then(crate::asn1::BitString::first_set_bit)
        .and_then(TsaFailure::from_bit);
    if let Some(failure) = failure {
        parts.push(failure.message().to_owned());
    }
    if parts.is_empty() {
        "no reason given".to_owned()
    } else {
        parts.join("; ")
    }
}
