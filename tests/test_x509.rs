
use {
    anyhow::Result,
    fixtures::{make_ca, make_certificate, secondary_key, shared_key, CertParams},
    trustpath::{
        asn1::encode,
        x509::{
            certificate_from_bytes, certificate_to_pem, certificates_from_pem,
            extract_issuer_dn, extract_ocsp_responder_url, extract_serial_number,
            extract_subject_dn, extract_validity, validate_certificate, VerificationError,
        },
    },
};

#[test]
fn loads_and_extracts_generated_certificates() -> Result<()> {
    let ca = make_ca("Fixture CA", shared_key());
    let leaf = make_certificate(
        &CertParams {
            serial:         900,
            subject_cn:     "leaf.example",
            issuer_cn:      "Fixture CA",
            ocsp_url:       Some("http://ocsp.example/status"),
            ca_issuers_url: None,
        },
        secondary_key().spki(),
        shared_key(),
    );

    let reloaded = certificate_from_bytes(&encode(&leaf)?)?;
    assert_eq!(reloaded, leaf);
    assert_eq!(extract_serial_number(&reloaded)?.to_string(), "900");
    assert_eq!(extract_subject_dn(&reloaded)?, "CN=leaf.example");
    assert_eq!(extract_issuer_dn(&reloaded)?, "CN=Fixture CA");
    assert_eq!(
        extract_ocsp_responder_url(&reloaded)?.as_deref(),
        Some("http://ocsp.example/status")
    );
    let (not_before, not_after) = extract_validity(&reloaded)?;
    assert!(not_before < not_after);

    assert_eq!(extract_subject_dn(&ca)?, extract_issuer_dn(&leaf)?);
    Ok(())
}

#[test]
fn pem_bundle_round_trips() -> Result<()> {
    let ca = make_ca("PEM CA", shared_key());
    let der = encode(&ca)?;
    let bundle = format!("{}{}", certificate_to_pem(&der), certificate_to_pem(&der));
    let recovered = certificates_from_pem(&bundle)?;
    assert_eq!(recovered.len(), 2);
    assert_eq!(recovered[0], der);
    assert_eq!(certificate_from_bytes(certificate_to_pem(&der).as_bytes())?, ca);
    Ok(())
}

#[test]
fn validates_a_genuine_chain() -> Result<()> {
    let ca = make_ca("Signing CA", shared_key());
    let leaf = make_certificate(
        &CertParams::basic(7, "signed.example", "Signing CA"),
        secondary_key().spki(),
        shared_key(),
    );
    validate_certificate(&leaf, &ca)?;
    // Self-signed root checks out against itself.
    validate_certificate(&ca, &ca)?;
    Ok(())
}

#[test]
fn rejects_a_tampered_signature() -> Result<()> {
    let ca = make_ca("Signing CA", shared_key());
    let leaf = make_certificate(
        &CertParams::basic(8, "signed.example", "Signing CA"),
        secondary_key().spki(),
        shared_key(),
    );

    let mut der = encode(&leaf)?;
    let last = der.len() - 1; // inside the signature BIT STRING
    der[last] ^= 0x01;
    let tampered = certificate_from_bytes(&der)?;

    let err = validate_certificate(&tampered, &ca).unwrap_err();
    assert!(matches!(err, VerificationError::BadSignature(_)));
    Ok(())
}

#[test]
fn rejects_the_wrong_issuer_key() -> Result<()> {
    let other_ca = make_ca("Other CA", secondary_key());
    let leaf = make_certificate(
        &CertParams::basic(9, "signed.example", "Signing CA"),
        secondary_key().spki(),
        shared_key(),
    );
    assert!(validate_certificate(&leaf, &other_ca).is_err());
    Ok(())
}
