//! Default device attestation verifier.
//!
//! ## Verification Flow
//!
//! ```text
//! ┌───────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ DAC: VID/PID, │──▶│ Attestation  │──▶│ PAI ↔ DAC    │──▶│ PAA lookup   │
//! │ public key    │   │ signature    │   │ VID/PID      │   │ by PAI AKID  │
//! └───────────────┘   └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                                                  │
//! ┌───────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────▼───────┐
//! │ CD payload vs │◀──│ CD signature │◀──│ Elements and │◀──│ PAA→PAI→DAC  │
//! │ device        │   │ (CMS)        │   │ nonce        │   │ chain        │
//! └───────────────┘   └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! The first failing step decides the result.

use std::collections::HashMap;
use std::sync::Arc;

use dac_crypto::{
    constant_time_eq, P256PublicKey, P256_ECDSA_SIGNATURE_LENGTH_RAW, SHA256_HASH_LENGTH,
};
use tracing::{debug, error, info, instrument, warn};

use crate::cd::{
    decode_certification_elements, validate_cd, validate_cd_signature,
    validate_firmware_information,
};
use crate::cd_keys::{CdKeysTrustStore, CsaCdKeysTrustStore};
use crate::completion::VerificationCompleter;
use crate::config::VerifierConfig;
use crate::elements::{deconstruct_attestation_elements, deconstruct_nocsr_elements};
use crate::error::VerifyError;
use crate::info::{AttestationInfo, DeviceInfoForAttestation};
use crate::result::AttestationVerificationResult;
use crate::revocation::{DacRevocationDelegate, RevocationQuery};
use crate::signature::validate_attestation_signature;
use crate::trust_store::AttestationTrustStore;
use crate::verifier::DeviceAttestationVerifier;
use crate::x509::{validate_attestation_chain, MatterCertificate};

type AvrResult<T> = Result<T, AttestationVerificationResult>;

/// Verifier backed by a PAA trust store and the CSA CD signing keys.
pub struct DefaultDacVerifier {
    paa_store: Arc<dyn AttestationTrustStore>,
    cd_keys: Arc<dyn CdKeysTrustStore>,
    config: VerifierConfig,
    revocation: Option<Arc<dyn DacRevocationDelegate>>,
    firmware_digests: HashMap<(u16, u16), [u8; SHA256_HASH_LENGTH]>,
}

impl DefaultDacVerifier {
    /// Verifier using `paa_store` and the built-in CSA CD keys.
    pub fn new(paa_store: Arc<dyn AttestationTrustStore>, config: VerifierConfig) -> Self {
        info!(
            allow_test_cd_key = config.allow_test_cd_signing_key,
            validity = ?config.validity_policy,
            "Default DAC verifier created"
        );
        Self {
            paa_store,
            cd_keys: Arc::new(CsaCdKeysTrustStore::new()),
            config,
            revocation: None,
            firmware_digests: HashMap::new(),
        }
    }

    /// Replace the CD signing key store.
    #[must_use]
    pub fn with_cd_keys(mut self, cd_keys: Arc<dyn CdKeysTrustStore>) -> Self {
        self.cd_keys = cd_keys;
        self
    }

    /// Answer revocation checks with `delegate`. Without one, every chain is
    /// reported as not revoked and
    /// [`implements_revocation_check`](DeviceAttestationVerifier::implements_revocation_check)
    /// is `false`.
    #[must_use]
    pub fn with_revocation_delegate(mut self, delegate: Arc<dyn DacRevocationDelegate>) -> Self {
        self.revocation = Some(delegate);
        self
    }

    /// Require devices of `vendor_id`/`product_id` to report firmware
    /// information whose SHA-256 is `digest`.
    #[must_use]
    pub fn with_expected_firmware_digest(
        mut self,
        vendor_id: u16,
        product_id: u16,
        digest: [u8; SHA256_HASH_LENGTH],
    ) -> Self {
        self.firmware_digests.insert((vendor_id, product_id), digest);
        self
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    fn verify(&self, info: &AttestationInfo<'_>) -> AvrResult<()> {
        if info.pai_der.is_empty() {
            return Err(AttestationVerificationResult::PaiMissing);
        }
        if info.dac_der.is_empty()
            || info.attestation_elements.is_empty()
            || info.attestation_challenge.is_empty()
            || info.attestation_signature.is_empty()
            || info.attestation_nonce.is_empty()
        {
            return Err(AttestationVerificationResult::InvalidArgument);
        }
        if info.attestation_elements.len() > self.config.max_attestation_elements_len {
            warn!(
                len = info.attestation_elements.len(),
                max = self.config.max_attestation_elements_len,
                "Attestation elements too large"
            );
            return Err(AttestationVerificationResult::InvalidArgument);
        }

        let dac = MatterCertificate::from_der(info.dac_der)
            .map_err(|_| AttestationVerificationResult::DacFormatInvalid)?;
        let (dac_vid, dac_pid) = match (dac.vendor_id(), dac.product_id()) {
            (Ok(Some(vid)), Ok(Some(pid))) => (vid, pid),
            _ => return Err(AttestationVerificationResult::DacFormatInvalid),
        };
        let dac_public_key = dac
            .public_key()
            .map_err(|_| AttestationVerificationResult::DacFormatInvalid)?;

        if info.attestation_signature.len() != P256_ECDSA_SIGNATURE_LENGTH_RAW {
            return Err(AttestationVerificationResult::AttestationSignatureInvalidFormat);
        }
        validate_attestation_signature(
            &dac_public_key,
            info.attestation_elements,
            info.attestation_challenge,
            info.attestation_signature,
        )
        .map_err(|e| {
            debug!(error = %e, "Attestation signature rejected");
            AttestationVerificationResult::AttestationSignatureInvalid
        })?;

        let pai = MatterCertificate::from_der(info.pai_der)
            .map_err(|_| AttestationVerificationResult::PaiFormatInvalid)?;
        let pai_vid = pai
            .vendor_id()
            .map_err(|_| AttestationVerificationResult::PaiFormatInvalid)?
            .filter(|vid| *vid == dac_vid)
            .ok_or(AttestationVerificationResult::DacVendorIdMismatch)?;
        let pai_pid = pai
            .product_id()
            .map_err(|_| AttestationVerificationResult::PaiFormatInvalid)?;
        if pai_pid.is_some_and(|pid| pid != dac_pid) {
            return Err(AttestationVerificationResult::DacProductIdMismatch);
        }

        let paa_skid = pai
            .authority_key_id()
            .ok_or(AttestationVerificationResult::PaiFormatInvalid)?;
        let paa = self
            .paa_store
            .get_product_attestation_authority_cert(&paa_skid)
            .ok_or_else(|| {
                warn!(akid = %hex::encode(paa_skid), "No trusted PAA for PAI");
                AttestationVerificationResult::PaaNotFound
            })?;
        let paa_vid = paa
            .vendor_id()
            .map_err(|_| AttestationVerificationResult::PaaFormatInvalid)?;
        if paa_vid.is_some_and(|vid| vid != pai_vid) {
            return Err(AttestationVerificationResult::PaiVendorIdMismatch);
        }
        if !matches!(paa.product_id(), Ok(None)) {
            return Err(AttestationVerificationResult::PaaFormatInvalid);
        }

        let now = chrono::Utc::now().timestamp();
        validate_attestation_chain(paa, &pai, &dac, self.config.validity_policy, now)?;

        let elements = deconstruct_attestation_elements(info.attestation_elements).map_err(|e| {
            debug!(error = %e, "Attestation elements malformed");
            AttestationVerificationResult::AttestationElementsMalformed
        })?;
        if !constant_time_eq(elements.attestation_nonce, info.attestation_nonce) {
            return Err(AttestationVerificationResult::AttestationNonceMismatch);
        }

        let cd_payload =
            self.validate_certification_declaration_signature(elements.certification_declaration)?;

        let device_info = DeviceInfoForAttestation {
            vendor_id: info.vendor_id,
            product_id: info.product_id,
            dac_vendor_id: dac_vid,
            dac_product_id: dac_pid,
            pai_vendor_id: pai_vid,
            pai_product_id: pai_pid,
            paa_vendor_id: paa_vid,
            paa_skid,
            expected_firmware_digest: self
                .firmware_digests
                .get(&(info.vendor_id, info.product_id))
                .copied(),
        };
        self.validate_certificate_declaration_payload(
            cd_payload,
            elements.firmware_info,
            &device_info,
        )
    }
}

impl DeviceAttestationVerifier for DefaultDacVerifier {
    #[instrument(
        skip(self, info, on_completion),
        fields(vid = info.vendor_id, pid = info.product_id)
    )]
    fn verify_attestation_information(
        &self,
        info: &AttestationInfo<'_>,
        on_completion: VerificationCompleter,
    ) {
        let result = AttestationVerificationResult::from_outcome(self.verify(info));
        if result.is_success() {
            info!("Device attestation succeeded");
        } else {
            warn!(code = result.code(), %result, "Device attestation failed");
        }
        on_completion.complete(result);
    }

    fn validate_certification_declaration_signature<'a>(
        &self,
        cms_envelope: &'a [u8],
    ) -> AvrResult<&'a [u8]> {
        validate_cd_signature(
            cms_envelope,
            self.cd_keys.as_ref(),
            self.config.allow_test_cd_signing_key,
        )
    }

    fn validate_certificate_declaration_payload(
        &self,
        cd_payload: &[u8],
        firmware_info: &[u8],
        device_info: &DeviceInfoForAttestation,
    ) -> AvrResult<()> {
        let cd = decode_certification_elements(cd_payload).map_err(|e| {
            debug!(error = %e, "CD payload not decodable");
            AttestationVerificationResult::CertificationDeclarationInvalidFormat
        })?;
        validate_cd(&cd, device_info)?;
        validate_firmware_information(firmware_info, device_info)
    }

    #[instrument(skip_all)]
    fn verify_node_operational_csr_information(
        &self,
        nocsr_elements: &[u8],
        attestation_challenge: &[u8],
        attestation_signature: &[u8],
        dac_public_key: &P256PublicKey,
        csr_nonce: &[u8],
    ) -> Result<(), VerifyError> {
        if nocsr_elements.is_empty() || attestation_challenge.is_empty() || csr_nonce.is_empty() {
            return Err(VerifyError::invalid_argument("empty NOCSR input"));
        }
        if attestation_signature.len() != P256_ECDSA_SIGNATURE_LENGTH_RAW {
            return Err(VerifyError::invalid_argument(format!(
                "NOCSR signature must be {P256_ECDSA_SIGNATURE_LENGTH_RAW} bytes, got {}",
                attestation_signature.len()
            )));
        }

        let elements = deconstruct_nocsr_elements(nocsr_elements)?;
        if !constant_time_eq(elements.csr_nonce, csr_nonce) {
            return Err(VerifyError::CsrNonceMismatch);
        }
        validate_attestation_signature(
            dac_public_key,
            nocsr_elements,
            attestation_challenge,
            attestation_signature,
        )?;
        debug!("NOCSR elements verified");
        Ok(())
    }

    #[instrument(skip_all)]
    fn check_for_revoked_dac_chain(
        &self,
        info: &AttestationInfo<'_>,
        on_completion: VerificationCompleter,
    ) {
        let Some(delegate) = self.revocation.clone() else {
            debug!("No revocation source configured");
            on_completion.complete(AttestationVerificationResult::Success);
            return;
        };

        let query = match RevocationQuery::from_der(info.dac_der, info.pai_der) {
            Ok(query) => query,
            Err(e) => {
                warn!(error = %e, "Cannot build revocation query");
                on_completion.complete(AttestationVerificationResult::InternalError);
                return;
            },
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "Revocation check needs a tokio runtime");
                on_completion.complete(AttestationVerificationResult::InternalError);
                return;
            },
        };

        runtime.spawn(async move {
            let result = match delegate.check_for_revoked_dac_chain(&query).await {
                Ok(status) => status.to_result(),
                Err(e) => {
                    warn!(error = %e, "Revocation source failed");
                    AttestationVerificationResult::InternalError
                },
            };
            on_completion.complete(result);
        });
    }

    fn implements_revocation_check(&self) -> bool {
        self.revocation.is_some()
    }
}

impl std::fmt::Debug for DefaultDacVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultDacVerifier")
            .field("config", &self.config)
            .field("has_revocation_delegate", &self.revocation.is_some())
            .field("firmware_digests", &self.firmware_digests.len())
            .finish_non_exhaustive()
    }
}
