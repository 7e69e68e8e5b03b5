//! Test PKI and attestation fixtures.
//!
//! The certificates under `tests/data` form a FFF1 chain:
//!
//! ```text
//! paa_fff1 (key 0x1001) ─▶ pai_fff1 (key 0x2001) ─▶ dac_fff1_8000 (key 0x3001)
//! paa_novid (key 0x1002) ─▶ pai_fff1_novid_paa (key 0x2002)
//! ```
//!
//! Private keys are the small scalars shown, big-endian.

use std::sync::Arc;

use dac_crypto::{sha256, P256Signer};
use dac_verify_core::{
    construct_attestation_elements, ArrayAttestationTrustStore, AttestationInfo,
    AttestationVerificationResult, DefaultDacVerifier, DeviceAttestationVerifier, VerifierConfig,
};

pub const PAA_FFF1: &[u8] = include_bytes!("../data/paa_fff1.der");
pub const PAA_NOVID: &[u8] = include_bytes!("../data/paa_novid.der");
pub const PAI_FFF1: &[u8] = include_bytes!("../data/pai_fff1.der");
pub const PAI_FFF1_PID_8001: &[u8] = include_bytes!("../data/pai_fff1_pid_8001.der");
pub const PAI_FFF1_NOVID_PAA: &[u8] = include_bytes!("../data/pai_fff1_novid_paa.der");
pub const DAC_FFF1_8000: &[u8] = include_bytes!("../data/dac_fff1_8000.der");
pub const DAC_FFF1_8000_EXPIRED: &[u8] = include_bytes!("../data/dac_fff1_8000_expired.der");
pub const DAC_FFF1_NOVID: &[u8] = include_bytes!("../data/dac_fff1_novid.der");
pub const DAC_FFF2_8000: &[u8] = include_bytes!("../data/dac_fff2_8000.der");

/// CD for VID 0xFFF1 / PID 0x8000, signed with the CSA test key.
pub const CMS_CD_FFF1_8000: &str = "3081e806092a864886f70d010702a081da3081d7020103310d300b060960864801\
    6503040201304506092a864886f70d010701a0380436152400012501f1ff360205008018250334122c04135a4947\
    32303134315a423333303030312d32342405002406002507942624080018317c307a020103801462fa823359acfa\
    a9963e1cfa140addf504f37160300b0609608648016503040201300a06082a8648ce3d0403020446304402204\
    3a63f2b943df33c38b3e02fcaa75fe3532aebbf5e63f5bbdbc0b1f01d3c4f6002204c1abf5f1807b81894b1576c\
    47e4724e4d966c612ed3fa25c118c3f2b3f90369";

pub const NONCE: [u8; 32] = [0x5A; 32];
pub const CHALLENGE: [u8; 16] = [0xC3; 16];
pub const TIMESTAMP: u32 = 0x2A00_0000;

/// Signer for a small big-endian private scalar.
pub fn signer(scalar: u32) -> P256Signer {
    let mut bytes = [0u8; 32];
    bytes[28..].copy_from_slice(&scalar.to_be_bytes());
    P256Signer::from_bytes(&bytes).unwrap()
}

pub fn dac_signer() -> P256Signer {
    signer(0x3001)
}

pub fn cms_cd() -> Vec<u8> {
    hex::decode(CMS_CD_FFF1_8000).unwrap()
}

/// Rewrite the `FFF1` vendor ID attributes as lowercase `fff1`. Leaves the
/// certificate parseable but its signature broken.
pub fn with_lowercase_vendor_id(der: &[u8]) -> Vec<u8> {
    const UPPER: &[u8] = b"\x0c\x04FFF1";
    let mut out = der.to_vec();
    let mut i = 0;
    while let Some(pos) = out[i..].windows(UPPER.len()).position(|w| w == UPPER) {
        let at = i + pos + 2;
        out[at..at + 4].copy_from_slice(b"fff1");
        i = at + 4;
    }
    assert_ne!(out, der, "no vendor ID attribute found");
    out
}

/// Attestation response from a FFF1/8000 device, signed with its DAC key.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub dac: Vec<u8>,
    pub pai: Vec<u8>,
    pub elements: Vec<u8>,
    pub signature: Vec<u8>,
    pub nonce: Vec<u8>,
    pub challenge: Vec<u8>,
    pub vendor_id: u16,
    pub product_id: u16,
}

impl Fixture {
    pub fn new() -> Self {
        let elements =
            construct_attestation_elements(&cms_cd(), &NONCE, TIMESTAMP, &[], &[]).unwrap();
        Self::with_elements(elements)
    }

    pub fn with_firmware(firmware: &[u8]) -> Self {
        let elements =
            construct_attestation_elements(&cms_cd(), &NONCE, TIMESTAMP, firmware, &[]).unwrap();
        Self::with_elements(elements)
    }

    /// Any payload, correctly signed.
    pub fn with_elements(elements: Vec<u8>) -> Self {
        let mut fixture = Self {
            dac: DAC_FFF1_8000.to_vec(),
            pai: PAI_FFF1.to_vec(),
            elements,
            signature: Vec::new(),
            nonce: NONCE.to_vec(),
            challenge: CHALLENGE.to_vec(),
            vendor_id: 0xFFF1,
            product_id: 0x8000,
        };
        fixture.sign_with(&dac_signer());
        fixture
    }

    pub fn sign_with(&mut self, signer: &P256Signer) {
        let digest = sha256(&[self.elements.as_slice(), self.challenge.as_slice()].concat());
        self.signature = signer.sign_hash(&digest).unwrap().as_bytes().to_vec();
    }

    pub fn info(&self) -> AttestationInfo<'_> {
        AttestationInfo {
            dac_der: &self.dac,
            pai_der: &self.pai,
            attestation_elements: &self.elements,
            attestation_challenge: &self.challenge,
            attestation_signature: &self.signature,
            attestation_nonce: &self.nonce,
            vendor_id: self.vendor_id,
            product_id: self.product_id,
        }
    }
}

pub fn development_config() -> VerifierConfig {
    VerifierConfig {
        allow_test_cd_signing_key: true,
        ..VerifierConfig::default()
    }
}

pub fn verifier_with(config: VerifierConfig) -> DefaultDacVerifier {
    let store = ArrayAttestationTrustStore::from_certs([PAA_FFF1, PAA_NOVID]).unwrap();
    DefaultDacVerifier::new(Arc::new(store), config)
}

pub fn verifier() -> DefaultDacVerifier {
    verifier_with(development_config())
}

/// Run a verifier that completes before returning.
pub fn run(
    verifier: &dyn DeviceAttestationVerifier,
    fixture: &Fixture,
) -> AttestationVerificationResult {
    let mut handle = verifier.verify_attestation(&fixture.info());
    handle.try_result().expect("verifier completed synchronously")
}
