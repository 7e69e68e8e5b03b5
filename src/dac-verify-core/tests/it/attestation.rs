//! End-to-end device attestation against the test PKI.

use std::sync::Arc;

use dac_crypto::sha256;
use dac_verify_core::{
    construct_nocsr_elements, validate_attestation_chain, ArrayAttestationTrustStore,
    AttestationVerificationResult, CertificateValidityPolicy, DefaultDacVerifier,
    DeviceAttestationVerifier, MatterCertificate, VerifierConfig, VerifyError,
};
use proptest::prelude::*;

use crate::support::{
    dac_signer, development_config, run, signer, verifier, verifier_with,
    with_lowercase_vendor_id, Fixture, DAC_FFF1_8000, DAC_FFF1_8000_EXPIRED, DAC_FFF1_NOVID,
    DAC_FFF2_8000, PAA_FFF1, PAA_NOVID, PAI_FFF1, PAI_FFF1_NOVID_PAA, PAI_FFF1_PID_8001,
};

// =============================================================================
// Happy Path
// =============================================================================

#[test]
fn valid_device_is_accepted() {
    assert_eq!(
        run(&verifier(), &Fixture::new()),
        AttestationVerificationResult::Success
    );
}

#[tokio::test]
async fn valid_device_is_accepted_through_handle() {
    let fixture = Fixture::new();
    let handle = verifier().verify_attestation(&fixture.info());
    assert_eq!(handle.await, Some(AttestationVerificationResult::Success));
}

// =============================================================================
// Input Validation
// =============================================================================

#[test]
fn missing_pai_is_reported() {
    let mut fixture = Fixture::new();
    fixture.pai.clear();
    assert_eq!(
        run(&verifier(), &fixture),
        AttestationVerificationResult::PaiMissing
    );
}

#[test]
fn empty_challenge_is_invalid_argument() {
    let mut fixture = Fixture::new();
    fixture.challenge.clear();
    assert_eq!(
        run(&verifier(), &fixture),
        AttestationVerificationResult::InvalidArgument
    );
}

#[test]
fn short_signature_has_invalid_format() {
    let mut fixture = Fixture::new();
    fixture.signature.truncate(63);
    assert_eq!(
        run(&verifier(), &fixture),
        AttestationVerificationResult::AttestationSignatureInvalidFormat
    );
}

// =============================================================================
// Attestation Signature
// =============================================================================

#[test]
fn signature_from_other_key_is_invalid() {
    let mut fixture = Fixture::new();
    fixture.sign_with(&signer(0x3002));
    assert_eq!(
        run(&verifier(), &fixture),
        AttestationVerificationResult::AttestationSignatureInvalid
    );
}

#[test]
fn challenge_swapped_with_other_session_is_invalid() {
    let mut fixture = Fixture::new();
    fixture.challenge = vec![0x3C; 16];
    assert_eq!(
        run(&verifier(), &fixture),
        AttestationVerificationResult::AttestationSignatureInvalid
    );
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        max_shrink_iters: 200,
        ..ProptestConfig::default()
    })]

    // ========================================================================
    // Tamper Detection
    // ========================================================================

    /// Any single-byte change to the elements after signing is caught.
    #[test]
    fn tampered_elements_fail_signature(pos in any::<prop::sample::Index>(), delta in 1u8..=255) {
        let mut fixture = Fixture::new();
        let i = pos.index(fixture.elements.len());
        fixture.elements[i] = fixture.elements[i].wrapping_add(delta);

        prop_assert_eq!(
            run(&verifier(), &fixture),
            AttestationVerificationResult::AttestationSignatureInvalid
        );
    }

    /// Any single-byte change to the challenge after signing is caught.
    #[test]
    fn tampered_challenge_fails_signature(pos in any::<prop::sample::Index>(), delta in 1u8..=255) {
        let mut fixture = Fixture::new();
        let i = pos.index(fixture.challenge.len());
        fixture.challenge[i] = fixture.challenge[i].wrapping_add(delta);

        prop_assert_eq!(
            run(&verifier(), &fixture),
            AttestationVerificationResult::AttestationSignatureInvalid
        );
    }
}

// =============================================================================
// Certificate Chain
// =============================================================================

#[test]
fn dac_without_vendor_id_is_malformed() {
    let mut fixture = Fixture::new();
    fixture.dac = DAC_FFF1_NOVID.to_vec();
    assert_eq!(
        run(&verifier(), &fixture),
        AttestationVerificationResult::DacFormatInvalid
    );
}

#[test]
fn dac_vendor_differs_from_pai() {
    let mut fixture = Fixture::new();
    fixture.dac = DAC_FFF2_8000.to_vec();
    assert_eq!(
        run(&verifier(), &fixture),
        AttestationVerificationResult::DacVendorIdMismatch
    );
}

#[test]
fn dac_product_differs_from_pai() {
    let mut fixture = Fixture::new();
    fixture.pai = PAI_FFF1_PID_8001.to_vec();
    assert_eq!(
        run(&verifier(), &fixture),
        AttestationVerificationResult::DacProductIdMismatch
    );
}

#[test]
fn unknown_paa_is_not_found() {
    let verifier = DefaultDacVerifier::new(
        Arc::new(ArrayAttestationTrustStore::new()),
        development_config(),
    );
    assert_eq!(
        run(&verifier, &Fixture::new()),
        AttestationVerificationResult::PaaNotFound
    );
}

#[test]
fn expired_dac_is_rejected() {
    let mut fixture = Fixture::new();
    fixture.dac = DAC_FFF1_8000_EXPIRED.to_vec();
    assert_eq!(
        run(&verifier(), &fixture),
        AttestationVerificationResult::DacExpired
    );
}

#[test]
fn expired_dac_accepted_when_expiry_ignored() {
    let mut fixture = Fixture::new();
    fixture.dac = DAC_FFF1_8000_EXPIRED.to_vec();
    let config = VerifierConfig {
        validity_policy: CertificateValidityPolicy::IgnoreExpiry,
        ..development_config()
    };
    assert_eq!(
        run(&verifier_with(config), &fixture),
        AttestationVerificationResult::Success
    );
}

#[test]
fn dac_from_other_pai_breaks_chain() {
    // Vendor-neutral PAA is trusted, but the DAC was not issued by this PAI.
    let mut fixture = Fixture::new();
    fixture.pai = PAI_FFF1_NOVID_PAA.to_vec();
    assert_eq!(
        run(&verifier(), &fixture),
        AttestationVerificationResult::DacSignatureInvalid
    );
}

#[test]
fn chain_links_are_checked_per_role() {
    let paa = MatterCertificate::from_der(PAA_NOVID).unwrap();
    let pai = MatterCertificate::from_der(PAI_FFF1_NOVID_PAA).unwrap();
    let dac = MatterCertificate::from_der(DAC_FFF1_8000).unwrap();
    let fff1_paa = MatterCertificate::from_der(PAA_FFF1).unwrap();
    let now = chrono::Utc::now().timestamp();
    let policy = CertificateValidityPolicy::Enforce;

    assert_eq!(paa.vendor_id().unwrap(), None);
    assert_eq!(pai.authority_key_id(), paa.subject_key_id());
    assert!(pai.verify_signed_by(&paa).is_ok());

    assert_eq!(
        validate_attestation_chain(&paa, &pai, &dac, policy, now),
        Err(AttestationVerificationResult::DacSignatureInvalid)
    );
    assert_eq!(
        validate_attestation_chain(&fff1_paa, &pai, &dac, policy, now),
        Err(AttestationVerificationResult::PaiSignatureInvalid)
    );
}

#[test]
fn malformed_vendor_id_is_not_vendor_neutral() {
    let paa = MatterCertificate::from_der(&with_lowercase_vendor_id(PAA_FFF1)).unwrap();
    assert!(paa.vendor_id().is_err());
    assert_eq!(
        MatterCertificate::from_der(PAA_NOVID).unwrap().vendor_id().unwrap(),
        None
    );

    let paa = with_lowercase_vendor_id(PAA_FFF1);
    let store = ArrayAttestationTrustStore::from_certs([paa]).unwrap();
    let verifier = DefaultDacVerifier::new(Arc::new(store), development_config());
    assert_eq!(
        run(&verifier, &Fixture::new()),
        AttestationVerificationResult::PaaFormatInvalid
    );
}

#[test]
fn malformed_vendor_id_maps_to_certificate_role() {
    let mut fixture = Fixture::new();
    fixture.pai = with_lowercase_vendor_id(PAI_FFF1);
    assert_eq!(
        run(&verifier(), &fixture),
        AttestationVerificationResult::PaiFormatInvalid
    );

    let mut fixture = Fixture::new();
    fixture.dac = with_lowercase_vendor_id(DAC_FFF1_8000);
    assert_eq!(
        run(&verifier(), &fixture),
        AttestationVerificationResult::DacFormatInvalid
    );
}

#[test]
fn test_pki_parses() {
    let dac = MatterCertificate::from_der(DAC_FFF1_8000).unwrap();
    let paa = MatterCertificate::from_der(PAA_FFF1).unwrap();

    assert_eq!(dac.vendor_id().unwrap(), Some(0xFFF1));
    assert_eq!(dac.product_id().unwrap(), Some(0x8000));
    assert!(!dac.is_ca());
    assert!(paa.is_ca());
    assert_eq!(paa.product_id().unwrap(), None);
    assert_eq!(paa.authority_key_id(), paa.subject_key_id());
}

// =============================================================================
// Nonce And Certification Declaration
// =============================================================================

#[test]
fn nonce_mismatch_is_reported() {
    let mut fixture = Fixture::new();
    fixture.nonce = vec![0xA5; 32];
    assert_eq!(
        run(&verifier(), &fixture),
        AttestationVerificationResult::AttestationNonceMismatch
    );
}

#[test]
fn signed_garbage_elements_are_malformed() {
    let fixture = Fixture::with_elements(vec![0x15, 0x30, 0x01, 0x00, 0x18]);
    assert_eq!(
        run(&verifier(), &fixture),
        AttestationVerificationResult::AttestationElementsMalformed
    );
}

#[test]
fn test_cd_key_refused_by_default() {
    assert_eq!(
        run(&verifier_with(VerifierConfig::default()), &Fixture::new()),
        AttestationVerificationResult::CertificationDeclarationNoCertificateFound
    );
}

#[test]
fn basic_information_vendor_must_match_cd() {
    let mut fixture = Fixture::new();
    fixture.vendor_id = 0xFFF2;
    assert_eq!(
        run(&verifier(), &fixture),
        AttestationVerificationResult::CertificationDeclarationInvalidVendorId
    );
}

#[test]
fn basic_information_product_must_be_certified() {
    let mut fixture = Fixture::new();
    fixture.product_id = 0x8001;
    assert_eq!(
        run(&verifier(), &fixture),
        AttestationVerificationResult::CertificationDeclarationInvalidProductId
    );
}

// =============================================================================
// Firmware Information
// =============================================================================

#[test]
fn expected_firmware_must_be_reported() {
    let verifier = verifier().with_expected_firmware_digest(0xFFF1, 0x8000, sha256(b"fw-1.0"));

    assert_eq!(
        run(&verifier, &Fixture::new()),
        AttestationVerificationResult::FirmwareInformationMissing
    );
    assert_eq!(
        run(&verifier, &Fixture::with_firmware(b"fw-0.9")),
        AttestationVerificationResult::FirmwareInformationMismatch
    );
    assert_eq!(
        run(&verifier, &Fixture::with_firmware(b"fw-1.0")),
        AttestationVerificationResult::Success
    );
}

#[test]
fn firmware_is_opaque_without_expectation() {
    assert_eq!(
        run(&verifier(), &Fixture::with_firmware(b"anything")),
        AttestationVerificationResult::Success
    );
}

// =============================================================================
// Node Operational CSR
// =============================================================================

#[test]
fn nocsr_elements_verify_with_dac_key() {
    let csr_nonce = [0x11u8; 32];
    let challenge = [0x22u8; 16];
    let nocsr = construct_nocsr_elements(b"csr-der", &csr_nonce, &[]).unwrap();

    let digest = sha256(&[nocsr.as_slice(), challenge.as_slice()].concat());
    let signature = dac_signer().sign_hash(&digest).unwrap();
    let dac_key = MatterCertificate::from_der(DAC_FFF1_8000)
        .unwrap()
        .public_key()
        .unwrap();
    let verifier = verifier();

    verifier
        .verify_node_operational_csr_information(
            &nocsr,
            &challenge,
            signature.as_bytes(),
            &dac_key,
            &csr_nonce,
        )
        .unwrap();

    let wrong_nonce = verifier.verify_node_operational_csr_information(
        &nocsr,
        &challenge,
        signature.as_bytes(),
        &dac_key,
        &[0x12u8; 32],
    );
    assert!(matches!(wrong_nonce, Err(VerifyError::CsrNonceMismatch)));

    let wrong_challenge = verifier.verify_node_operational_csr_information(
        &nocsr,
        &[0x23u8; 16],
        signature.as_bytes(),
        &dac_key,
        &csr_nonce,
    );
    assert!(matches!(wrong_challenge, Err(VerifyError::CryptoError(_))));
}
