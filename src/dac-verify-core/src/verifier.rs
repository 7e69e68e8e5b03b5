//! The pluggable device attestation verifier.
//!
//! Implementations decide whether a candidate device's identity chain and
//! Certification Declaration are acceptable. The commissioning flow only
//! talks to `dyn DeviceAttestationVerifier`, obtained from a
//! [`VerifierContext`](crate::registry::VerifierContext).

use dac_crypto::P256PublicKey;
use tracing::error;

use crate::completion::{verification_channel, VerificationCompleter, VerificationHandle};
use crate::error::VerifyError;
use crate::info::{AttestationInfo, DeviceInfoForAttestation};
use crate::result::AttestationVerificationResult;

/// Device attestation policy.
///
/// Every method except [`verify_attestation_information`] has a default.
/// The defaults answer `NotImplemented`, except
/// [`check_for_revoked_dac_chain`], which terminates the process: a verifier
/// that is asked about revocation without answering must never let a device
/// through. Verifiers that provide a real check also override
/// [`implements_revocation_check`].
///
/// [`verify_attestation_information`]: Self::verify_attestation_information
/// [`check_for_revoked_dac_chain`]: Self::check_for_revoked_dac_chain
/// [`implements_revocation_check`]: Self::implements_revocation_check
pub trait DeviceAttestationVerifier: Send + Sync {
    /// Verify the full attestation information and report through
    /// `on_completion` once all work is done.
    fn verify_attestation_information(
        &self,
        info: &AttestationInfo<'_>,
        on_completion: VerificationCompleter,
    );

    /// Run [`verify_attestation_information`](Self::verify_attestation_information)
    /// and return a handle to await its verdict.
    fn verify_attestation(&self, info: &AttestationInfo<'_>) -> VerificationHandle {
        let (completer, handle) = verification_channel();
        self.verify_attestation_information(info, completer);
        handle
    }

    /// Verify the CMS envelope of a Certification Declaration and return the
    /// signed payload, borrowed from `cms_envelope`.
    fn validate_certification_declaration_signature<'a>(
        &self,
        cms_envelope: &'a [u8],
    ) -> Result<&'a [u8], AttestationVerificationResult> {
        let _ = cms_envelope;
        Err(AttestationVerificationResult::NotImplemented)
    }

    /// Cross-reference a Certification Declaration payload with the device.
    fn validate_certificate_declaration_payload(
        &self,
        cd_payload: &[u8],
        firmware_info: &[u8],
        device_info: &DeviceInfoForAttestation,
    ) -> Result<(), AttestationVerificationResult> {
        let _ = (cd_payload, firmware_info, device_info);
        Err(AttestationVerificationResult::NotImplemented)
    }

    /// Verify NOCSR elements signed with the DAC key.
    fn verify_node_operational_csr_information(
        &self,
        nocsr_elements: &[u8],
        attestation_challenge: &[u8],
        attestation_signature: &[u8],
        dac_public_key: &P256PublicKey,
        csr_nonce: &[u8],
    ) -> Result<(), VerifyError> {
        let _ = (
            nocsr_elements,
            attestation_challenge,
            attestation_signature,
            dac_public_key,
            csr_nonce,
        );
        Err(VerifyError::NotImplemented)
    }

    /// Check the DAC and PAI against a revocation source.
    ///
    /// The default aborts the process.
    fn check_for_revoked_dac_chain(
        &self,
        info: &AttestationInfo<'_>,
        on_completion: VerificationCompleter,
    ) {
        let _ = (info, on_completion);
        error!("Revocation check reached a verifier without one, aborting");
        std::process::abort();
    }

    /// Run [`check_for_revoked_dac_chain`](Self::check_for_revoked_dac_chain)
    /// and return a handle to await its verdict.
    fn check_revocation(&self, info: &AttestationInfo<'_>) -> VerificationHandle {
        let (completer, handle) = verification_channel();
        self.check_for_revoked_dac_chain(info, completer);
        handle
    }

    /// Whether [`check_for_revoked_dac_chain`](Self::check_for_revoked_dac_chain)
    /// consults a real revocation source.
    fn implements_revocation_check(&self) -> bool {
        false
    }
}

/// Placeholder verifier installed until a real one is registered.
///
/// It never signals a verification result: the completer is dropped, so
/// handles resolve to `None`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnimplementedDacVerifier;

impl DeviceAttestationVerifier for UnimplementedDacVerifier {
    fn verify_attestation_information(
        &self,
        _info: &AttestationInfo<'_>,
        _on_completion: VerificationCompleter,
    ) {
    }
}
