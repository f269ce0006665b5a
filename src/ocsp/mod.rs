//! OCSP request building and response checking (RFC 6960).
//!
//! Requests use the SHA-1 CertID form responders universally accept.
//! Response decoding walks the generic element tree; signature checking
//! collects the embedded responder certificates that both signed the
//! response and chain to the issuing CA.

use {
    crate::{
        asn1::{self, encode, tag::universal, Element, TagClass, TagEnvironment},
        crypto::HashAlg,
        oid,
        transport::{Transport, TransportError},
        x509::{
            certificate_from_bytes, extract_issuer_certificate_url, extract_issuer_der,
            extract_issuer_dn, extract_ocsp_responder_url, extract_serial_number,
            extract_subject_dn, extract_subject_public_key_bytes, validate_certificate,
            verify_with_certificate, CertificateError, VerificationError,
        },
    },
    num_bigint::BigInt,
    thiserror::Error,
    tracing::{debug, warn},
};

pub const OCSP_REQUEST_MEDIA_TYPE: &str = "application/ocsp-request";
pub const OCSP_RESPONSE_MEDIA_TYPE: &str = "application/ocsp-response";

#[derive(Debug, Error)]
pub enum OcspError {
    #[error("responder reported a malformed request")]
    MalformedRequest,
    #[error("responder reported an internal error")]
    InternalError,
    #[error("responder asked to retry later")]
    TryLater,
    #[error("responder requires signed requests")]
    SignatureRequired,
    #[error("request was not authorized")]
    Unauthorized,
    #[error("response status {0} is not defined")]
    UnknownStatus(i64),
    #[error("response carries no response bytes")]
    MissingResponseBytes,
    #[error("unsupported response type {0}")]
    UnsupportedResponseType(String),
    #[error("expected exactly one single response, found {0}")]
    MultipleResponses(usize),
    #[error("certificate names no OCSP responder")]
    MissingResponderUrl,
    #[error("response verification failed: {0}")]
    Verification(String),
    #[error(transparent)]
    Certificate(#[from] CertificateError),
    #[error(transparent)]
    CertificateChain(#[from] VerificationError),
    #[error(transparent)]
    Asn1(#[from] asn1::Asn1Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// One CertID worth of request material.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// SHA-1 over the issuer name as encoded in the checked certificate.
    pub issuer_name_hash: Vec<u8>,
    /// SHA-1 over the issuer's subject public key bytes.
    pub issuer_key_hash: Vec<u8>,
    pub serial_number:   BigInt,
}

impl Request {
    /// Build the CertID material for `certificate`, issued by `issuer`.
    pub fn from_certificate_pair(
        certificate: &Element,
        issuer: &Element,
    ) -> Result<Self, OcspError> {
        let request = Self {
            issuer_name_hash: HashAlg::Sha1.digest(&extract_issuer_der(certificate)?),
            issuer_key_hash:  HashAlg::Sha1.digest(extract_subject_public_key_bytes(issuer)?),
            serial_number:    extract_serial_number(certificate)?,
        };
        debug!(
            serial = %request.serial_number,
            issuer_key_hash = %hex::encode(&request.issuer_key_hash),
            "built CertID material"
        );
        Ok(request)
    }

    fn cert_id(&self) -> Element {
        Element::sequence(vec![
            Element::sequence(vec![Element::oid(oid::SHA1), Element::null()]),
            Element::octet_string(self.issuer_name_hash.clone()),
            Element::octet_string(self.issuer_key_hash.clone()),
            Element::integer(self.serial_number.clone()),
        ])
    }
}

/// Revocation reasons from RFC 5280 5.3.1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevocationReason {
    Unspecified,
    KeyCompromise,
    CaCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    CertificateHold,
    RemoveFromCrl,
    PrivilegeWithdrawn,
    AaCompromise,
}

impl RevocationReason {
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => Self::Unspecified,
            1 => Self::KeyCompromise,
            2 => Self::CaCompromise,
            3 => Self::AffiliationChanged,
            4 => Self::Superseded,
            5 => Self::CessationOfOperation,
            6 => Self::CertificateHold,
            8 => Self::RemoveFromCrl,
            9 => Self::PrivilegeWithdrawn,
            10 => Self::AaCompromise,
            _ => return None,
        })
    }
}

/// Status of one checked certificate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CertStatus {
    Good,
    Revoked {
        revoked_at: i64,
        reason:     Option<RevocationReason>,
    },
    Unknown,
}

/// One SingleResponse, reduced to what callers act on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    /// Serial number in decimal, matching how CAs print them.
    pub serial_number: String,
    pub this_update:   i64,
    pub status:        CertStatus,
}

/// The outcome of decoding a full OCSP response.
#[derive(Clone, Debug, Default)]
pub struct OcspDecodeResult {
    pub responses: Vec<Response>,
    /// DER of every embedded certificate that signed the response and
    /// chains to the issuing CA.
    pub signer_certificates: Vec<Vec<u8>>,
}

/// What to do with a response whose signature cannot be tied to a trusted
/// signer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Accept the response and log a warning. Matches the behavior most
    /// deployments expect from responders that omit their certificate.
    #[default]
    AllowUnverified,
    /// Reject the response outright.
    RequireVerifiedSigner,
}

/// OCSP client engine. Stateless apart from the configured trust policy.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ocsp {
    pub trust_policy: TrustPolicy,
}

impl Ocsp {
    pub fn new(trust_policy: TrustPolicy) -> Self {
        Self { trust_policy }
    }

    /// Encode an OCSPRequest covering every given CertID.
    pub fn build_request_body(&self, requests: &[Request]) -> Result<Vec<u8>, OcspError> {
        let request_list = Element::sequence(
            requests
                .iter()
                .map(|request| Element::sequence(vec![request.cert_id()]))
                .collect(),
        );
        let tbs_request = Element::sequence(vec![request_list]);
        Ok(encode(&Element::sequence(vec![tbs_request]))?)
    }

    /// Encode an OCSPRequest for a single CertID.
    pub fn build_request_body_single(&self, request: &Request) -> Result<Vec<u8>, OcspError> {
        self.build_request_body(std::slice::from_ref(request))
    }

    /// Full round trip: build the request, POST it to the responder named
    /// in the certificate, and decode the single response.
    pub fn check_certificate(
        &self,
        certificate: &Element,
        issuer: &Element,
        transport: &dyn Transport,
    ) -> Result<Response, OcspError> {
        let url = extract_ocsp_responder_url(certificate)?
            .ok_or(OcspError::MissingResponderUrl)?;
        let request = Request::from_certificate_pair(certificate, issuer)?;
        let body = self.build_request_body_single(&request)?;
        debug!(url, "querying OCSP responder");
        let raw = transport.send(&url, &body, OCSP_REQUEST_MEDIA_TYPE, OCSP_RESPONSE_MEDIA_TYPE)?;
        let result = self.decode_response(&raw, Some(issuer), Some(transport))?;
        expect_single(result)
    }

    /// Decode and check a raw OCSPResponse.
    ///
    /// `issuer` is the CA the responder should chain to; `transport`, when
    /// given, allows fetching a missing intermediate by its caIssuers URL.
    pub fn decode_response(
        &self,
        raw: &[u8],
        issuer: Option<&Element>,
        transport: Option<&dyn Transport>,
    ) -> Result<OcspDecodeResult, OcspError> {
        let response = asn1::decode(raw)?;
        let status = response
            .at(0)
            .and_then(Element::as_enumerated_i64)
            .ok_or_else(|| OcspError::Verification("missing responseStatus".into()))?;
        match status {
            0 => {}
            1 => return Err(OcspError::MalformedRequest),
            2 => return Err(OcspError::InternalError),
            3 => return Err(OcspError::TryLater),
            5 => return Err(OcspError::SignatureRequired),
            6 => return Err(OcspError::Unauthorized),
            other => return Err(OcspError::UnknownStatus(other)),
        }

        let response_bytes = response
            .first_child_of_type(0, TagClass::ContextSpecific, Some(TagEnvironment::Explicit))
            .ok_or(OcspError::MissingResponseBytes)?;
        let response_type = response_bytes
            .at(0)
            .and_then(Element::as_object_identifier)
            .ok_or_else(|| OcspError::Verification("missing responseType".into()))?;
        if *response_type != oid::ID_PKIX_OCSP_BASIC {
            return Err(OcspError::UnsupportedResponseType(response_type.to_string()));
        }
        let basic_der = response_bytes
            .at(1)
            .and_then(Element::as_octet_string)
            .ok_or_else(|| OcspError::Verification("missing response octets".into()))?;
        let basic = asn1::decode(basic_der)?;
        debug!("decoded BasicOCSPResponse");

        let signer_certificates = self.verify_signing(&basic, issuer, transport)?;

        let tbs_response_data = basic
            .at(0)
            .ok_or_else(|| OcspError::Verification("missing tbsResponseData".into()))?;
        let single_responses = tbs_response_data
            .first_child_of_type(universal::SEQUENCE, TagClass::Universal, None)
            .ok_or(OcspError::MissingResponseBytes)?;
        let responses = single_responses
            .children()
            .iter()
            .map(decode_single_response)
            .collect::<Result<Vec<_>, _>>()?;
        if responses.is_empty() {
            return Err(OcspError::MissingResponseBytes);
        }
        Ok(OcspDecodeResult {
            responses,
            signer_certificates,
        })
    }

    /// As [`Self::decode_response`], insisting on exactly one
    /// SingleResponse.
    pub fn decode_response_single(
        &self,
        raw: &[u8],
        issuer: Option<&Element>,
        transport: Option<&dyn Transport>,
    ) -> Result<Response, OcspError> {
        expect_single(self.decode_response(raw, issuer, transport)?)
    }

    /// Verify the response signature and return the DER of every embedded
    /// certificate that signed it and chains to `issuer`.
    fn verify_signing(
        &self,
        basic: &Element,
        issuer: Option<&Element>,
        transport: Option<&dyn Transport>,
    ) -> Result<Vec<Vec<u8>>, OcspError> {
        let tbs_response_data = basic
            .at(0)
            .ok_or_else(|| OcspError::Verification("missing tbsResponseData".into()))?;
        let signed_data = encode(tbs_response_data)?;
        let signature_algorithm = basic
            .at(1)
            .and_then(|algorithm| algorithm.at(0))
            .and_then(Element::as_object_identifier)
            .ok_or_else(|| OcspError::Verification("missing signatureAlgorithm".into()))?;
        let hash = oid::signature_digest(signature_algorithm.as_str())
            .ok_or_else(|| OcspError::Verification(format!(
                "unsupported signature algorithm {signature_algorithm}"
            )))?;
        let signature = basic
            .at(2)
            .and_then(Element::as_bit_string)
            .map(|bits| bits.bytes.as_slice())
            .ok_or_else(|| OcspError::Verification("missing signature".into()))?;

        let embedded: Vec<&Element> = basic
            .first_child_of_type(0, TagClass::ContextSpecific, Some(TagEnvironment::Explicit))
            .map(|certs| certs.children().iter().collect())
            .unwrap_or_default();

        let mut signers = Vec::new();
        // The CA itself may have signed the response directly.
        if let Some(issuer) = issuer {
            if verify_with_certificate(&signed_data, signature, issuer, hash).is_ok() {
                signers.push(encode(issuer)?);
            }
        }
        for certificate in &embedded {
            let certificate = (*certificate).clone().untagged();
            if verify_with_certificate(&signed_data, signature, &certificate, hash).is_err() {
                continue;
            }
            match self.resolve_issuer(&certificate, &embedded, issuer, transport)? {
                Some(chain_issuer)
                    if validate_certificate(&certificate, &chain_issuer).is_ok() =>
                {
                    signers.push(encode(&certificate)?);
                }
                _ => {
                    debug!("responder certificate signed the response but has no trusted chain");
                }
            }
        }

        if signers.is_empty() {
            match self.trust_policy {
                TrustPolicy::RequireVerifiedSigner => {
                    return Err(OcspError::Verification(
                        "no verified signer for the response".into(),
                    ));
                }
                TrustPolicy::AllowUnverified => {
                    warn!("accepting OCSP response without a verified signer");
                }
            }
        }
        Ok(signers)
    }

    /// Find the certificate that issued `certificate`: the caller-supplied
    /// CA, another embedded certificate, or one fetched by its caIssuers
    /// URL.
    fn resolve_issuer(
        &self,
        certificate: &Element,
        embedded: &[&Element],
        issuer: Option<&Element>,
        transport: Option<&dyn Transport>,
    ) -> Result<Option<Element>, OcspError> {
        let issuer_dn = extract_issuer_dn(certificate)?;
        if let Some(issuer) = issuer {
            if extract_subject_dn(issuer)? == issuer_dn {
                return Ok(Some(issuer.clone()));
            }
        }
        for candidate in embedded {
            let candidate = (*candidate).clone().untagged();
            if candidate != *certificate && extract_subject_dn(&candidate)? == issuer_dn {
                return Ok(Some(candidate));
            }
        }
        if let (Some(transport), Ok(Some(url))) =
            (transport, extract_issuer_certificate_url(certificate))
        {
            debug!(url, "fetching issuer certificate");
            let der = transport.fetch(&url)?;
            return Ok(Some(certificate_from_bytes(&der)?));
        }
        Ok(None)
    }
}

fn expect_single(result: OcspDecodeResult) -> Result<Response, OcspError> {
    let mut responses = result.responses;
    if responses.len() != 1 {
        return Err(OcspError::MultipleResponses(responses.len()));
    }
    Ok(responses.swap_remove(0))
}

/// Reduce one SingleResponse to its serial, thisUpdate and status. The
/// certStatus CHOICE is keyed by context tag: [0] good, [1] revoked,
/// [2] unknown.
fn decode_single_response(single: &Element) -> Result<Response, OcspError> {
    let fields = single
        .require_sequence()
        .map_err(|_| OcspError::Verification("SingleResponse is not a SEQUENCE".into()))?;
    let cert_id = fields
        .first()
        .ok_or_else(|| OcspError::Verification("missing certID".into()))?;
    let serial_number = cert_id
        .at(3)
        .and_then(Element::as_integer)
        .ok_or_else(|| OcspError::Verification("missing serialNumber".into()))?
        .to_string();

    let status_element = fields
        .get(1)
        .ok_or_else(|| OcspError::Verification("missing certStatus".into()))?;
    let status = decode_cert_status(status_element)?;

    let this_update = fields
        .get(2)
        .and_then(Element::as_timestamp)
        .ok_or_else(|| OcspError::Verification("missing thisUpdate".into()))?;

    Ok(Response {
        serial_number,
        this_update,
        status,
    })
}

fn decode_cert_status(status: &Element) -> Result<CertStatus, OcspError> {
    // A revoked status without a reason decodes to the revocationTime with
    // an attached [1] tag; with a reason it stays a raw [1] constructed.
    if let Some(tag) = status.tag() {
        if tag.class == TagClass::ContextSpecific && tag.number == 1 {
            let revoked_at = status
                .as_timestamp()
                .ok_or_else(|| OcspError::Verification("missing revocationTime".into()))?;
            return Ok(CertStatus::Revoked {
                revoked_at,
                reason: None,
            });
        }
        return Err(OcspError::Verification("unrecognized certStatus".into()));
    }
    if status.class() != TagClass::ContextSpecific {
        return Err(OcspError::Verification("unrecognized certStatus".into()));
    }
    if status.type_id() == 0 {
        return Ok(CertStatus::Good);
    }
    if status.type_id() == 2 {
        return Ok(CertStatus::Unknown);
    }
    if status.type_id() == 1 {
        let revoked_at = status
            .at(0)
            .and_then(Element::as_timestamp)
            .ok_or_else(|| OcspError::Verification("missing revocationTime".into()))?;
        let reason = status
            .at(1)
            .and_then(revocation_code)
            .and_then(RevocationReason::from_code);
        return Ok(CertStatus::Revoked { revoked_at, reason });
    }
    Err(OcspError::Verification("unrecognized certStatus".into()))
}

/// The revocationReason is [0] EXPLICIT ENUMERATED; tolerate an implicit
/// single-byte encoding as well.
fn revocation_code(element: &Element) -> Option<i64> {
    if let Some(code) = element.as_enumerated_i64() {
        return Some(code);
    }
    match element.as_raw_bytes() {
        Some([code]) => Some(i64::from(*code)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::asn1::{decode, GeneralizedTime, Tag},
    };

    fn request() -> Request {
        Request {
            issuer_name_hash: vec![0x11; 20],
            issuer_key_hash:  vec![0x22; 20],
            serial_number:    BigInt::from(0x0102_0304),
        }
    }

    #[test]
    fn request_body_structure() {
        let body = Ocsp::default().build_request_body_single(&request()).unwrap();
        let decoded = decode(&body).unwrap();
        let cert_id = decoded
            .at(0) // tbsRequest
            .and_then(|tbs| tbs.at(0)) // requestList
            .and_then(|list| list.at(0)) // Request
            .and_then(|request| request.at(0)) // reqCert
            .unwrap();
        assert_eq!(
            cert_id.at(0).and_then(|alg| alg.at(0)).unwrap().as_object_identifier().unwrap(),
            oid::SHA1
        );
        assert_eq!(cert_id.at(1).unwrap().as_octet_string().unwrap(), &[0x11; 20]);
        assert_eq!(cert_id.at(2).unwrap().as_octet_string().unwrap(), &[0x22; 20]);
        assert_eq!(
            cert_id.at(3).unwrap().as_integer().unwrap(),
            &BigInt::from(0x0102_0304)
        );
    }

    #[test]
    fn multi_request_bodies_hold_every_cert_id() {
        let body = Ocsp::default()
            .build_request_body(&[request(), request()])
            .unwrap();
        let decoded = decode(&body).unwrap();
        let list = decoded.at(0).and_then(|tbs| tbs.at(0)).unwrap();
        assert_eq!(list.children().len(), 2);
    }

    fn status_response(status: i64) -> Vec<u8> {
        encode(&Element::sequence(vec![Element::enumerated(status)])).unwrap()
    }

    #[test]
    fn error_statuses_map_to_errors() {
        let ocsp = Ocsp::default();
        for (status, expected) in [
            (1, "malformed"),
            (2, "internal"),
            (3, "retry"),
            (5, "signed requests"),
            (6, "not authorized"),
        ] {
            let err = ocsp
                .decode_response(&status_response(status), None, None)
                .unwrap_err();
            assert!(err.to_string().contains(expected), "status {status}: {err}");
        }
        assert!(matches!(
            ocsp.decode_response(&status_response(4), None, None),
            Err(OcspError::UnknownStatus(4))
        ));
    }

    #[test]
    fn success_without_response_bytes_is_an_error() {
        let err = Ocsp::default()
            .decode_response(&status_response(0), None, None)
            .unwrap_err();
        assert!(matches!(err, OcspError::MissingResponseBytes));
    }

    fn single_response(status: Element) -> Element {
        let cert_id = Element::sequence(vec![
            Element::sequence(vec![Element::oid(oid::SHA1), Element::null()]),
            Element::octet_string(vec![0x11; 20]),
            Element::octet_string(vec![0x22; 20]),
            Element::integer(77),
        ]);
        Element::sequence(vec![
            cert_id,
            status,
            Element::generalized_time(GeneralizedTime::new(2024, 6, 1, 12, 0, 0).unwrap()),
        ])
    }

    #[test]
    fn cert_status_choice_arms() {
        let good = Element::raw_primitive(0u32, TagClass::ContextSpecific, Vec::new());
        assert_eq!(
            decode_single_response(&single_response(good)).unwrap().status,
            CertStatus::Good
        );

        let unknown = Element::raw_primitive(2u32, TagClass::ContextSpecific, Vec::new());
        assert_eq!(
            decode_single_response(&single_response(unknown)).unwrap().status,
            CertStatus::Unknown
        );

        // Round-trip a reasonless [1] through DER so the status is exactly
        // what the decoder produces for a single-child context element.
        let revoked_no_reason = decode(
            &encode(&Element::raw_constructed(
                1u32,
                TagClass::ContextSpecific,
                vec![Element::generalized_time(
                    GeneralizedTime::new(2024, 3, 1, 0, 0, 0).unwrap(),
                )],
            ))
            .unwrap(),
        )
        .unwrap();
        let response = decode_single_response(&single_response(revoked_no_reason)).unwrap();
        let CertStatus::Revoked { revoked_at, reason } = response.status else {
            panic!("expected a revoked status");
        };
        assert_eq!(reason, None);
        assert_eq!(
            revoked_at,
            GeneralizedTime::new(2024, 3, 1, 0, 0, 0).unwrap().unix_timestamp()
        );

        let revoked_with_reason = Element::raw_constructed(
            1u32,
            TagClass::ContextSpecific,
            vec![
                Element::generalized_time(GeneralizedTime::new(2024, 3, 1, 0, 0, 0).unwrap()),
                Element::enumerated(1).with_tag(Tag::explicit(0)),
            ],
        );
        let response = decode_single_response(&single_response(revoked_with_reason)).unwrap();
        assert_eq!(
            response.status,
            CertStatus::Revoked {
                revoked_at: GeneralizedTime::new(2024, 3, 1, 0, 0, 0).unwrap().unix_timestamp(),
                reason:     Some(RevocationReason::KeyCompromise),
            }
        );
        assert_eq!(response.serial_number, "77");
    }
}
